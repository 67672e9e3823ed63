//! Per-guild state
//!
//! Moderation settings, the muted role and the warning ledger for each guild,
//! kept in a shared map and persisted as YAML.

use crate::data::write_yaml_atomically;
use crate::moderation::ModlogEvent;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A modlog event routed to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModlogAction {
    pub event: ModlogEvent,
    pub channel_id: u64,
    /// Single-line rendering instead of an embed
    #[serde(default)]
    pub compact: bool,
}

/// Moderation settings for a guild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub enabled_actions: Vec<ModlogAction>,
}

/// Everything the bot stores about one guild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildWrapper {
    pub guild_id: u64,
    pub muted_role_id: Option<u64>,
    pub moderation: ModerationConfig,
    /// user id -> warning reasons, oldest first
    pub warnings: HashMap<u64, Vec<String>>,
}

impl GuildWrapper {
    #[must_use]
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_event_enabled(&self, event: ModlogEvent) -> bool {
        self.modlog_action(event).is_some()
    }

    /// Channel configured for `event`, if any
    #[must_use]
    pub fn modlog_channel(&self, event: ModlogEvent) -> Option<u64> {
        self.modlog_action(event).map(|action| action.channel_id)
    }

    #[must_use]
    pub fn is_event_compacted(&self, event: ModlogEvent) -> bool {
        self.modlog_action(event).is_some_and(|action| action.compact)
    }

    fn modlog_action(&self, event: ModlogEvent) -> Option<&ModlogAction> {
        self.moderation
            .enabled_actions
            .iter()
            .find(|action| action.event == event)
    }

    /// Enable `event`, replacing any existing routing for it
    pub fn enable_event(&mut self, event: ModlogEvent, channel_id: u64, compact: bool) {
        self.moderation.enabled_actions.retain(|action| action.event != event);
        self.moderation.enabled_actions.push(ModlogAction {
            event,
            channel_id,
            compact,
        });
    }

    /// Append a warning and return how many the user now has
    pub fn add_warning(&mut self, user_id: u64, reason: impl Into<String>) -> usize {
        let ledger = self.warnings.entry(user_id).or_default();
        ledger.push(reason.into());
        ledger.len()
    }

    #[must_use]
    pub fn warnings_for(&self, user_id: u64) -> &[String] {
        self.warnings
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Shared map of guild id -> guild state
///
/// Mutations go through [`GuildStore::update`], which holds the map's shard lock
/// for the guild, so concurrent commands against one guild are serialized.
#[derive(Clone, Default)]
pub struct GuildStore {
    guilds: Arc<DashMap<u64, GuildWrapper>>,
    save_lock: Arc<Mutex<()>>,
}

impl GuildStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a guild's state, defaulted when unknown
    #[must_use]
    pub fn get(&self, guild_id: u64) -> GuildWrapper {
        self.guilds
            .get(&guild_id)
            .map_or_else(|| GuildWrapper::new(guild_id), |entry| entry.value().clone())
    }

    /// Mutate a guild's state in place, creating it if needed
    pub fn update<R>(&self, guild_id: u64, f: impl FnOnce(&mut GuildWrapper) -> R) -> R {
        let mut entry = self
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildWrapper::new(guild_id));
        f(entry.value_mut())
    }

    pub fn insert(&self, wrapper: GuildWrapper) {
        self.guilds.insert(wrapper.guild_id, wrapper);
    }

    pub fn add_warning(&self, guild_id: u64, user_id: u64, reason: impl Into<String>) -> usize {
        self.update(guild_id, |guild| guild.add_warning(user_id, reason))
    }

    #[must_use]
    pub fn warnings(&self, guild_id: u64, user_id: u64) -> Vec<String> {
        self.guilds
            .get(&guild_id)
            .map(|entry| entry.warnings_for(user_id).to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Load guild state from a YAML file. A missing file yields an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, crate::Error> {
        let store = Self::new();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e.into()),
        };

        let guilds: Vec<GuildWrapper> = serde_yaml::from_str(&content)?;
        for guild in guilds {
            store.insert(guild);
        }
        info!("Loaded state for {} guild(s) from {}", store.len(), path.display());
        Ok(store)
    }

    /// Save guild state to a YAML file, creating parent directories as needed
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<(), crate::Error> {
        // Snapshot under the lock so the last write carries the newest state
        let _guard = self.save_lock.lock().await;
        let mut guilds: Vec<GuildWrapper> =
            self.guilds.iter().map(|entry| entry.value().clone()).collect();
        guilds.sort_by_key(|guild| guild.guild_id);
        write_yaml_atomically(path, &guilds).await
    }
}
