//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where every
//! service is instantiated and wired together, mirroring the teacher's
//! `bootstrap_services`. Wiring order:
//!
//! 1. Task spawner (from the current Tokio runtime)
//! 2. Event bridge (broadcast transport for domain events)
//! 3. File cache (depends on config's cache dir/limit)
//! 4. Player registry (depends on cache, spawner, event bridge, and the
//!    resolver/voice-platform implementations the embedder supplies)

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::FileCache;
use crate::config::{Config, ConfigError};
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::player::PlayerDeps;
use crate::registry::{PlayerDepsFactory, PlayerRegistry};
use crate::resolver::Resolver;
use crate::runtime::TokioSpawner;
use crate::settings::{InMemorySettingsStore, SettingsStore};
use crate::voice::VoicePlatform;

/// Event channel backlog before lagging subscribers start missing events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The platform-specific collaborators an embedder must supply; everything
/// else in [`BootstrappedServices`] is wired internally.
pub struct ExternalServices {
    pub resolver: Arc<dyn Resolver>,
    pub voice: Arc<dyn VoicePlatform>,
    /// Defaults to an in-memory store if the embedder has no persistence layer.
    pub settings_store: Option<Arc<dyn SettingsStore>>,
}

struct DefaultDepsFactory {
    resolver: Arc<dyn Resolver>,
    voice: Arc<dyn VoicePlatform>,
    cache: Arc<FileCache>,
    spawner: TokioSpawner,
    emitter: Arc<dyn EventEmitter>,
    settings_store: Arc<dyn SettingsStore>,
}

impl PlayerDepsFactory for DefaultDepsFactory {
    fn build(&self, _guild_id: &str) -> PlayerDeps {
        PlayerDeps {
            voice: self.voice.clone(),
            resolver: self.resolver.clone(),
            cache: self.cache.clone(),
            spawner: Arc::new(self.spawner.clone()),
            emitter: self.emitter.clone(),
            settings_store: self.settings_store.clone(),
        }
    }
}

/// Container for all bootstrapped services, consumed by the server binary.
#[derive(Clone)]
pub struct BootstrappedServices {
    pub registry: Arc<PlayerRegistry>,
    pub cache: Arc<FileCache>,
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub spawner: TokioSpawner,
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown: every registered player is stopped and
    /// disconnected, then the cancellation token is fired for anything else
    /// watching it (the idle sweep, the health server).
    pub async fn shutdown(&self) {
        log::info!("beginning graceful shutdown");
        self.cancel_token.cancel();
        self.registry.shutdown_all().await;
        log::info!("shutdown complete");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to open file cache: {0}")]
    Cache(#[from] crate::cache::CacheError),
}

/// Bootstraps every service in dependency order.
pub fn bootstrap_services(
    config: &Config,
    external: ExternalServices,
) -> Result<BootstrappedServices, BootstrapError> {
    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();
    let event_bridge = Arc::new(BroadcastEventBridge::new(EVENT_CHANNEL_CAPACITY));

    let cache = Arc::new(FileCache::open(&config.cache_dir, config.cache_limit_bytes)?);

    let settings_store = external
        .settings_store
        .unwrap_or_else(|| Arc::new(InMemorySettingsStore::new()));

    let deps_factory = Arc::new(DefaultDepsFactory {
        resolver: external.resolver,
        voice: external.voice,
        cache: cache.clone(),
        spawner: spawner.clone(),
        emitter: event_bridge.clone() as Arc<dyn EventEmitter>,
        settings_store,
    });

    let registry = Arc::new(PlayerRegistry::new(
        deps_factory,
        event_bridge.clone() as Arc<dyn EventEmitter>,
    ));
    registry.spawn_idle_sweep(&spawner);

    Ok(BootstrappedServices {
        registry,
        cache,
        event_bridge,
        spawner,
        cancel_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolveError, ResolveOutcome};
    use crate::voice::{FrameSource, VoiceRoomId};
    use async_trait::async_trait;

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

    #[tokio::test]
    async fn bootstrap_wires_a_usable_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let external = ExternalServices {
            resolver: Arc::new(NullResolver),
            voice: Arc::new(NullVoice),
            settings_store: None,
        };
        let services = bootstrap_services(&config, external).unwrap();
        assert_eq!(services.registry.guild_count(), 0);
        services.registry.get_or_create("guild-1");
        assert_eq!(services.registry.guild_count(), 1);
        services.shutdown().await;
        assert_eq!(services.registry.guild_count(), 0);
    }
}
