use std::path::Path;
use std::{fmt, ops::Deref, sync::Arc, sync::OnceLock};

use crate::commands::prune::PendingPrune;
use crate::config::BotConfig;
use crate::confirm::ConfirmationRegistry;
use crate::guild::GuildStore;
use crate::moderation::{FutureActionQueue, ModerationService, Platform, QueueRequest};
use serde::Serialize;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("guilds", &self.guilds.len())
            .field("future_actions", &self.future_actions.len())
            .field("confirmations", &self.confirmations.len())
            .finish()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct DataInner {
    pub config: BotConfig,
    /// Per-guild settings and warning ledgers
    pub guilds: GuildStore,
    pub moderation: ModerationService,
    /// Pending reversals of temp bans and mutes
    pub future_actions: FutureActionQueue,
    /// Prunes awaiting `prune confirm`
    pub confirmations: ConfirmationRegistry<PendingPrune>,
    pub platform: Arc<dyn Platform>,
    queue_tx: OnceLock<Sender<QueueRequest>>,
}

impl Data {
    /// Wire the moderation service over already loaded state
    pub fn new(
        config: BotConfig,
        platform: Arc<dyn Platform>,
        guilds: GuildStore,
        future_actions: FutureActionQueue,
    ) -> Self {
        let moderation = ModerationService::new(
            Arc::clone(&platform),
            Arc::new(future_actions.clone()),
            guilds.clone(),
        )
        .with_ban_delete_days(config.ban_delete_message_days);
        let confirmations = ConfirmationRegistry::with_ttl(config.confirmation_window());

        Self(Arc::new(DataInner {
            config,
            guilds,
            moderation,
            future_actions,
            confirmations,
            platform,
            queue_tx: OnceLock::new(),
        }))
    }

    /// Load guild state and queued actions from the data directory
    ///
    /// # Errors
    /// Returns an error if a data file exists but cannot be read or parsed.
    pub async fn load(
        config: BotConfig,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, crate::Error> {
        let guilds = GuildStore::load(&config.guilds_path()).await?;
        let future_actions = FutureActionQueue::load(&config.future_actions_path()).await?;
        info!(
            guilds = guilds.len(),
            future_actions = future_actions.len(),
            "Loaded bot data from {}",
            config.data_dir.display()
        );
        Ok(Self::new(config, platform, guilds, future_actions))
    }

    /// Save guild state and queued actions to the data directory
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created or a file
    /// cannot be serialized or written.
    pub async fn save(&self) -> Result<(), crate::Error> {
        self.guilds.save(&self.config.guilds_path()).await?;
        self.future_actions
            .save(&self.config.future_actions_path())
            .await?;
        Ok(())
    }

    /// Start the task that reverses expired temp bans and mutes
    pub fn start_future_actions(&self) -> JoinHandle<()> {
        let (tx, handle) = self.future_actions.start(
            self.moderation.clone(),
            self.config.future_action_interval(),
            self.config.future_actions_path(),
        );
        if self.queue_tx.set(tx).is_err() {
            warn!("Future action task was already started");
        }
        handle
    }

    /// Ask the future action task to check for due actions now
    pub async fn request_check(&self) {
        self.send_queue_request(QueueRequest::CheckNow).await;
    }

    /// Stop the future action task
    pub async fn shutdown(&self) {
        self.send_queue_request(QueueRequest::Shutdown).await;
    }

    async fn send_queue_request(&self, request: QueueRequest) {
        let Some(tx) = self.queue_tx.get() else {
            return;
        };
        if let Err(e) = tx.send(request).await {
            warn!("Failed to reach future action task: {e}");
        }
    }
}

/// Serialize `value` as YAML and replace `path` with it.
///
/// The content goes to a uniquely named sibling file first and is renamed over
/// `path`, so readers never see a partially written file.
///
/// # Errors
/// Returns an error if serialization, the write or the rename fails.
pub(crate) async fn write_yaml_atomically<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), crate::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_yaml::to_string(value)?;
    let file_name = path
        .file_name()
        .map_or_else(|| "data".into(), |name| name.to_string_lossy());
    let temp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    tokio::fs::write(&temp, content).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}
