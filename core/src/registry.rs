//! The process-wide player registry (component E): one [`PlayerHandle`] per
//! guild, created lazily, reaped after a period of idleness.
//!
//! Grounded on a sibling module's DashMap-backed session store: a single
//! concurrent map keyed by guild id, with a background sweep task rather
//! than per-entry timers for eviction.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::events::{DomainEvent, EventEmitter, RegistryEvent};
use crate::player::{spawn_player, PlayerDeps, PlayerHandle};
use crate::runtime::TaskSpawner;

/// How long a player may sit `IDLE` before the sweep reaps it.
const DEFAULT_IDLE_REAP_AFTER: Duration = Duration::from_secs(10 * 60);
/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Builds fresh [`PlayerDeps`] for a newly created guild player. One instance
/// is shared by the registry; it is expected to hand out clones of shared
/// services (cache, resolver, voice platform) and nothing guild-specific.
pub trait PlayerDepsFactory: Send + Sync {
    fn build(&self, guild_id: &str) -> PlayerDeps;
}

/// Owns every guild's player actor. Created once at process startup.
pub struct PlayerRegistry {
    players: DashMap<String, PlayerHandle>,
    deps_factory: Arc<dyn PlayerDepsFactory>,
    emitter: Arc<dyn EventEmitter>,
    idle_reap_after: Duration,
}

impl PlayerRegistry {
    pub fn new(deps_factory: Arc<dyn PlayerDepsFactory>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            players: DashMap::new(),
            deps_factory,
            emitter,
            idle_reap_after: DEFAULT_IDLE_REAP_AFTER,
        }
    }

    /// Returns the guild's player, spawning one if this is the first request
    /// for that guild.
    pub fn get_or_create(&self, guild_id: &str) -> PlayerHandle {
        if let Some(existing) = self.players.get(guild_id) {
            return existing.clone();
        }
        let deps = self.deps_factory.build(guild_id);
        let handle = spawn_player(guild_id.to_string(), deps);
        self.players.insert(guild_id.to_string(), handle.clone());
        self.emitter.emit(DomainEvent::Registry(RegistryEvent::PlayerCreated {
            guild_id: guild_id.to_string(),
        }));
        handle
    }

    /// Returns the guild's player only if one already exists.
    pub fn get_if_exists(&self, guild_id: &str) -> Option<PlayerHandle> {
        self.players.get(guild_id).map(|e| e.clone())
    }

    pub fn guild_count(&self) -> usize {
        self.players.len()
    }

    /// Spawns the periodic idle-player sweep on `spawner`. Call once at startup.
    pub fn spawn_idle_sweep(self: &Arc<Self>, spawner: &dyn TaskSpawner) {
        let registry = self.clone();
        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                registry.sweep_idle_players().await;
            }
        });
    }

    async fn sweep_idle_players(&self) {
        let candidates: Vec<(String, PlayerHandle)> = self
            .players
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (guild_id, handle) in candidates {
            if handle.is_idle_and_stale(self.idle_reap_after).await {
                self.players.remove(&guild_id);
                let _ = handle.shutdown().await;
                self.emitter.emit(DomainEvent::Registry(RegistryEvent::PlayerEvicted {
                    guild_id,
                }));
            }
        }
    }

    /// Shuts down every player concurrently. Called during process shutdown.
    pub async fn shutdown_all(&self) {
        let handles: Vec<PlayerHandle> =
            self.players.iter().map(|e| e.value().clone()).collect();
        let shutdowns = handles.iter().map(|h| h.shutdown());
        let _ = futures::future::join_all(shutdowns).await;
        self.players.clear();
    }
}

impl PlayerRegistry {
    /// Test/embedder constructor that reaps idle players almost immediately.
    #[cfg(test)]
    pub fn with_idle_reap_after(
        deps_factory: Arc<dyn PlayerDepsFactory>,
        emitter: Arc<dyn EventEmitter>,
        idle_reap_after: Duration,
    ) -> Self {
        Self {
            players: DashMap::new(),
            deps_factory,
            emitter,
            idle_reap_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::events::noop_emitter;
    use crate::resolver::{ResolveError, ResolveOutcome, Resolver};
    use crate::runtime::TokioSpawner;
    use crate::settings::InMemorySettingsStore;
    use crate::voice::{FrameSource, VoicePlatform, VoiceRoomId};
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

    fn test_registry(idle_reap_after: Duration) -> (PlayerRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::open(dir.path(), 10_000_000).unwrap());
        let factory = Arc::new(TestDepsFactory { cache });
        (
            PlayerRegistry::with_idle_reap_after(factory, noop_emitter(), idle_reap_after),
            dir,
        )
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_guild() {
        let (registry, _dir) = test_registry(Duration::from_secs(600));
        let a = registry.get_or_create("guild-1");
        let b = registry.get_or_create("guild-1");
        assert_eq!(a.guild_id, b.guild_id);
        assert_eq!(registry.guild_count(), 1);
    }

    #[tokio::test]
    async fn sweep_reaps_idle_players() {
        let (registry, _dir) = test_registry(Duration::from_millis(1));
        registry.get_or_create("guild-1");
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.sweep_idle_players().await;
        assert_eq!(registry.guild_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_all_clears_registry() {
        let (registry, _dir) = test_registry(Duration::from_secs(600));
        registry.get_or_create("guild-1");
        registry.get_or_create("guild-2");
        registry.shutdown_all().await;
        assert_eq!(registry.guild_count(), 0);
    }
}
