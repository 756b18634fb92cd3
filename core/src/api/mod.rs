//! Minimal operational HTTP surface: liveness and occupancy metrics only.
//!
//! No command traffic flows through this router (spec §1's command boundary
//! is external); it exists purely so an orchestrator (systemd, k8s) has
//! something to poll.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::cache::FileCache;
use crate::registry::PlayerRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<PlayerRegistry>,
    pub cache: Arc<FileCache>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

#[derive(Serialize)]
struct Metrics {
    guild_count: usize,
    cache_dir: String,
}

async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    Json(Metrics {
        guild_count: state.registry.guild_count(),
        cache_dir: state.cache.dir().display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::noop_emitter;
    use crate::player::PlayerDeps;
    use crate::registry::PlayerDepsFactory;
    use crate::resolver::{ResolveError, ResolveOutcome, Resolver};
    use crate::runtime::TokioSpawner;
    use crate::settings::InMemorySettingsStore;
    use crate::voice::{FrameSource, VoicePlatform, VoiceRoomId};
    use async_trait::async_trait;
    use tower::ServiceExt;

    struct NullResolver;
    #[async_trait]
    impl Resolver for NullResolver {
        async fn resolve(
            &self,
            _query: &str,
            _playlist_limit: usize,
            _split_chapters: bool,
        ) -> Result<ResolveOutcome, ResolveError> {
            Ok(ResolveOutcome {
                tracks: vec![],
                extra_message: None,
            })
        }
    }

    struct NullVoice;
    #[async_trait]
    impl VoicePlatform for NullVoice {
        async fn connect(&self, _room: &VoiceRoomId) -> Result<(), crate::error::ChorusError> {
            Ok(())
        }
        async fn move_to(&self, _room: &VoiceRoomId) -> Result<(), crate::error::ChorusError> {
            Ok(())
        }
        async fn disconnect(&self) {}
        fn play(
            &self,
            _source: Box<dyn FrameSource>,
            _on_complete: Box<dyn FnOnce(Result<(), crate::error::ChorusError>) + Send>,
        ) {
        }
        fn pause(&self) {}
        fn resume(&self) {}
        fn stop(&self) {}
        fn is_playing(&self) -> bool {
            false
        }
        fn is_paused(&self) -> bool {
            false
        }
        fn set_volume(&self, _ratio: f32) {}
    }

    struct TestDepsFactory {
        cache: Arc<FileCache>,
    }
    impl PlayerDepsFactory for TestDepsFactory {
        fn build(&self, _guild_id: &str) -> PlayerDeps {
            PlayerDeps {
                voice: Arc::new(NullVoice),
                resolver: Arc::new(NullResolver),
                cache: self.cache.clone(),
                spawner: Arc::new(TokioSpawner::current()),
                emitter: noop_emitter(),
                settings_store: Arc::new(InMemorySettingsStore::new()),
            }
        }
    }

    #[tokio::test]
    async fn healthz_returns_200() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::open(dir.path(), 1_000_000).unwrap());
        let factory = Arc::new(TestDepsFactory {
            cache: cache.clone(),
        });
        let registry = Arc::new(PlayerRegistry::new(factory, noop_emitter()));
        let app = router(ApiState { registry, cache });

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/healthz")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
