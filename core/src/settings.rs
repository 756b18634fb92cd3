//! Per-guild settings: the read-through interface the player consults on
//! connect. Owned by an external persistent config store (spec §1's Non-goal
//! list); this module only defines the shape and the trait the player reads
//! through.

use async_trait::async_trait;

/// Per-guild playback settings, read-through by the player on connect.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildSettings {
    pub default_volume: u8,
    pub auto_disconnect: bool,
    pub auto_disconnect_delay_secs: u64,
    pub queue_add_response_ephemeral: bool,
    pub queue_page_size: usize,
    pub leave_if_no_listeners: bool,
    /// "Reduce volume when humans speak" target, 0..100. `None` disables it.
    pub duck_volume_target: Option<u8>,
    /// Supplemental: restricts mutating commands to holders of this role, if set.
    pub dj_role: Option<String>,
    /// Supplemental: restricts commands to one text channel, if set.
    pub allowed_text_channel: Option<String>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            default_volume: 100,
            auto_disconnect: true,
            auto_disconnect_delay_secs: 30,
            queue_add_response_ephemeral: false,
            queue_page_size: 10,
            leave_if_no_listeners: true,
            duck_volume_target: None,
            dj_role: None,
            allowed_text_channel: None,
        }
    }
}

/// External settings store. `get_guild_settings` must create and persist
/// defaults on first access rather than returning an absence.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_guild_settings(&self, guild_id: &str) -> GuildSettings;
}

/// An in-memory settings store, useful for tests and for running without a
/// configured persistence backend.
#[derive(Default)]
pub struct InMemorySettingsStore {
    overrides: dashmap::DashMap<String, GuildSettings>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, guild_id: impl Into<String>, settings: GuildSettings) {
        self.overrides.insert(guild_id.into(), settings);
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_guild_settings(&self, guild_id: &str) -> GuildSettings {
        self.overrides
            .get(guild_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_defaults_on_miss() {
        let store = InMemorySettingsStore::new();
        let settings = store.get_guild_settings("guild-1").await;
        assert_eq!(settings.default_volume, 100);
        assert_eq!(settings.auto_disconnect_delay_secs, 30);
    }
}
