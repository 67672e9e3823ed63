//! Future actions
//!
//! Timed actions register their reversal here. [`FutureActionQueue`] keeps the
//! pending reversals and a background task performs them once they expire.

use crate::data::write_yaml_atomically;
use crate::moderation::{ModAction, ModerationError, ModerationResult, ModerationService};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Tag of the timed action a future action belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FutureActionKind {
    TempBan,
    TempMute,
}

impl FutureActionKind {
    /// Action that undoes this one
    #[must_use]
    pub fn reversal(self) -> ModAction {
        match self {
            Self::TempBan => ModAction::Unban,
            Self::TempMute => ModAction::Unmute,
        }
    }
}

impl fmt::Display for FutureActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TempBan => write!(f, "Temp Ban"),
            Self::TempMute => write!(f, "Temp Mute"),
        }
    }
}

/// A reversal waiting for its time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureAction {
    pub id: String,
    pub kind: FutureActionKind,
    pub guild_id: u64,
    pub channel_id: Option<u64>,
    pub responsible_id: u64,
    pub target_id: u64,
    pub reason: Option<String>,
    /// Human-friendly length of the original action
    pub duration_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Failed reversal attempts so far
    #[serde(default)]
    pub attempts: u32,
}

/// When an action of `duration` started now would expire
///
/// # Errors
/// Returns [`ModerationError::InvalidInput`] when the instant is not representable.
pub fn expiry_after(duration: Duration) -> ModerationResult<DateTime<Utc>> {
    Utc::now()
        .checked_add_signed(duration)
        .ok_or_else(|| ModerationError::InvalidInput("That duration is too long!".to_string()))
}

impl FutureAction {
    /// # Errors
    /// Returns [`ModerationError::InvalidInput`] when `duration` overflows the calendar.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: FutureActionKind,
        guild_id: u64,
        channel_id: Option<u64>,
        responsible_id: u64,
        target_id: u64,
        reason: Option<String>,
        duration: Duration,
    ) -> ModerationResult<Self> {
        let expires_at = expiry_after(duration)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            guild_id,
            channel_id,
            responsible_id,
            target_id,
            reason,
            duration_text: crate::moderation::format_duration(duration),
            created_at: Utc::now(),
            expires_at,
            attempts: 0,
        })
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Registration side of the scheduler
#[cfg_attr(test, mockall::automock)]
pub trait Scheduler: Send + Sync {
    /// Fire-and-forget registration of a future action
    fn queue_future_action(&self, action: FutureAction);

    /// Drop pending actions of `kind` against a user, returning how many were dropped
    fn cancel_for(&self, guild_id: u64, target_id: u64, kind: FutureActionKind) -> usize;
}

/// Requests understood by the queue task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRequest {
    /// Run due actions now instead of waiting for the next tick
    CheckNow,
    /// Stop the task
    Shutdown,
}

/// In-memory scheduler backed by a concurrent map
#[derive(Clone, Default)]
pub struct FutureActionQueue {
    actions: Arc<DashMap<String, FutureAction>>,
    save_lock: Arc<Mutex<()>>,
}

impl Scheduler for FutureActionQueue {
    fn queue_future_action(&self, action: FutureAction) {
        info!(
            action_id = %action.id,
            kind = %action.kind,
            guild_id = action.guild_id,
            target_id = action.target_id,
            expires_at = %action.expires_at,
            "Queued future action"
        );
        self.actions.insert(action.id.clone(), action);
    }

    fn cancel_for(&self, guild_id: u64, target_id: u64, kind: FutureActionKind) -> usize {
        let mut cancelled = 0;
        self.actions.retain(|_, action| {
            let matches =
                action.guild_id == guild_id && action.target_id == target_id && action.kind == kind;
            cancelled += usize::from(matches);
            !matches
        });
        if cancelled > 0 {
            info!(guild_id, target_id, %kind, cancelled, "Cancelled pending future action(s)");
        }
        cancelled
    }
}

impl FutureActionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<FutureAction> {
        self.actions.get(id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remove and return every action due at `now`
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<FutureAction> {
        let due: Vec<String> = self
            .actions
            .iter()
            .filter(|entry| entry.is_due(now))
            .map(|entry| entry.key().clone())
            .collect();

        due.iter()
            .filter_map(|id| self.actions.remove(id).map(|(_, action)| action))
            .collect()
    }

    /// Run every due reversal through `service`, returning how many were taken.
    ///
    /// Reversals that fail for a reason that may clear up are put back and
    /// retried on the next check.
    pub async fn process_due(&self, service: &ModerationService) -> usize {
        let due = self.take_due(Utc::now());
        let count = due.len();
        for mut action in due {
            let Err(e) = service.reverse(&action).await else {
                continue;
            };
            if e.is_retryable() {
                action.attempts += 1;
                warn!(
                    action_id = %action.id,
                    kind = %action.kind,
                    guild_id = action.guild_id,
                    target_id = action.target_id,
                    attempts = action.attempts,
                    "Future action failed, will retry: {e}"
                );
                self.actions.insert(action.id.clone(), action);
            } else {
                error!(
                    action_id = %action.id,
                    kind = %action.kind,
                    guild_id = action.guild_id,
                    target_id = action.target_id,
                    "Dropping future action that cannot run: {e}"
                );
            }
        }
        count
    }

    /// Process due actions and persist the queue if any were taken
    async fn tick(&self, service: &ModerationService, path: &Path) -> usize {
        let ran = self.process_due(service).await;
        if ran > 0 {
            if let Err(e) = self.save(path).await {
                error!("Failed to save future actions to {}: {e}", path.display());
            }
        }
        ran
    }

    /// Spawn the background task. The returned sender accepts [`QueueRequest`]s.
    ///
    /// The queue is saved to `path` after every check that took due actions.
    pub fn start(
        &self,
        service: ModerationService,
        check_interval: std::time::Duration,
        path: PathBuf,
    ) -> (Sender<QueueRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);
        let queue = self.clone();
        let handle = tokio::spawn(async move {
            queue.run(service, rx, check_interval, &path).await;
        });
        (tx, handle)
    }

    async fn run(
        &self,
        service: ModerationService,
        mut rx: Receiver<QueueRequest>,
        check_interval: std::time::Duration,
        path: &Path,
    ) {
        info!("Starting future action task with {check_interval:?} interval");
        let mut interval = tokio::time::interval(check_interval);

        loop {
            tokio::select! {
                request = rx.recv() => match request {
                    Some(QueueRequest::CheckNow) => {
                        let ran = self.tick(&service, path).await;
                        info!("Ran {ran} future action(s) on request");
                    }
                    Some(QueueRequest::Shutdown) | None => break,
                },
                _ = interval.tick() => {
                    let ran = self.tick(&service, path).await;
                    if ran > 0 {
                        info!("Ran {ran} due future action(s)");
                    }
                }
            }
        }

        info!("Future action task shut down");
    }

    /// Load pending actions from a YAML file. A missing file yields an empty queue.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, crate::Error> {
        let queue = Self::new();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(queue),
            Err(e) => return Err(e.into()),
        };
        let actions: Vec<FutureAction> = serde_yaml::from_str(&content)?;
        for action in actions {
            queue.actions.insert(action.id.clone(), action);
        }
        Ok(queue)
    }

    /// Save pending actions to a YAML file
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let _guard = self.save_lock.lock().await;
        let mut actions: Vec<FutureAction> =
            self.actions.iter().map(|entry| entry.value().clone()).collect();
        actions.sort_by_key(|action| action.expires_at);
        write_yaml_atomically(path, &actions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guild::GuildStore;
    use crate::moderation::parse_duration;
    use crate::moderation::platform::{GuildHierarchy, MemberInfo, MockPlatform, PlatformError};
    use mockall::predicate::eq;

    fn temp_ban(duration: Duration) -> FutureAction {
        FutureAction::new(FutureActionKind::TempBan, 1, None, 2, 3, Some("spam".into()), duration)
            .expect("duration fits")
    }

    /// A temp ban against someone other than the default target
    fn other_temp_ban(duration: Duration) -> FutureAction {
        FutureAction::new(FutureActionKind::TempBan, 1, None, 2, 30, None, duration)
            .expect("duration fits")
    }

    fn expired_temp_ban() -> FutureAction {
        let mut action = temp_ban(Duration::minutes(1));
        action.expires_at = Utc::now() - Duration::seconds(1);
        action
    }

    fn roster_hierarchy() -> GuildHierarchy {
        GuildHierarchy {
            owner_id: 99,
            requester: Some(MemberInfo::new(2, Some(5))),
            target: None,
            bot: MemberInfo::new(4, Some(10)),
        }
    }

    fn service_over(platform: MockPlatform, queue: &FutureActionQueue) -> ModerationService {
        ModerationService::new(Arc::new(platform), Arc::new(queue.clone()), GuildStore::new())
    }

    #[test]
    fn test_future_action_new() {
        let action = temp_ban(Duration::hours(2));
        assert_eq!(action.duration_text, "2 hours");
        assert_eq!(action.attempts, 0);
        assert!(action.expires_at - action.created_at >= Duration::hours(2));
        assert!(!action.is_due(Utc::now()));
        assert!(action.is_due(Utc::now() + Duration::hours(3)));
    }

    #[test]
    fn test_future_action_rejects_unrepresentable_expiry() {
        let duration = parse_duration("99999999w").expect("parses");
        let result = FutureAction::new(FutureActionKind::TempBan, 1, None, 2, 3, None, duration);
        assert!(matches!(result, Err(ModerationError::InvalidInput(_))));
        assert!(expiry_after(Duration::MAX).is_err());
    }

    #[test]
    fn test_reversal_kinds() {
        assert_eq!(FutureActionKind::TempBan.reversal(), ModAction::Unban);
        assert_eq!(FutureActionKind::TempMute.reversal(), ModAction::Unmute);
    }

    #[test]
    fn test_take_due_only_removes_expired() {
        let queue = FutureActionQueue::new();
        let expired = expired_temp_ban();
        let later = temp_ban(Duration::hours(1));
        let later_id = later.id.clone();

        queue.queue_future_action(expired.clone());
        queue.queue_future_action(later);
        assert_eq!(queue.len(), 2);

        let due = queue.take_due(Utc::now());
        assert_eq!(due, vec![expired]);
        assert_eq!(queue.len(), 1);
        assert!(queue.get(&later_id).is_some());
    }

    #[test]
    fn test_cancel_for_matches_guild_target_and_kind() {
        let queue = FutureActionQueue::new();
        queue.queue_future_action(temp_ban(Duration::hours(1)));
        queue.queue_future_action(temp_ban(Duration::hours(2)));
        let hour = Duration::hours(1);
        let mute = FutureAction::new(FutureActionKind::TempMute, 1, None, 2, 3, None, hour)
            .expect("duration fits");
        queue.queue_future_action(mute.clone());
        let elsewhere = FutureAction::new(FutureActionKind::TempBan, 8, None, 2, 3, None, hour)
            .expect("duration fits");
        queue.queue_future_action(elsewhere.clone());

        assert_eq!(queue.cancel_for(1, 3, FutureActionKind::TempBan), 2);
        assert_eq!(queue.cancel_for(1, 3, FutureActionKind::TempBan), 0);
        assert_eq!(queue.len(), 2);
        assert!(queue.get(&mute.id).is_some());
        assert!(queue.get(&elsewhere.id).is_some());
    }

    #[tokio::test]
    async fn test_process_due_unbans() {
        let mut platform = MockPlatform::new();
        platform
            .expect_hierarchy()
            .with(eq(1), eq(2), eq(3))
            .times(1)
            .returning(|_, _, _| Ok(roster_hierarchy()));
        platform
            .expect_unban()
            .with(eq(1), eq(3))
            .times(1)
            .returning(|_, _| Ok(()));

        let queue = FutureActionQueue::new();
        let service = service_over(platform, &queue);
        queue.queue_future_action(expired_temp_ban());
        queue.queue_future_action(other_temp_ban(Duration::hours(1)));

        assert_eq!(queue.process_due(&service).await, 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_action_queued() {
        let mut platform = MockPlatform::new();
        platform
            .expect_hierarchy()
            .times(1)
            .returning(|_, _, _| Err(PlatformError::Request("gateway timeout".into())));

        let queue = FutureActionQueue::new();
        let service = service_over(platform, &queue);
        let action = expired_temp_ban();
        queue.queue_future_action(action.clone());

        assert_eq!(queue.process_due(&service).await, 1);
        let retained = queue.get(&action.id).expect("action kept for retry");
        assert_eq!(retained.attempts, 1);
        assert!(retained.is_due(Utc::now()));
    }

    #[tokio::test]
    async fn test_permanent_failure_drops_action() {
        let mut platform = MockPlatform::new();
        platform
            .expect_hierarchy()
            .returning(|_, _, _| Ok(roster_hierarchy()));
        platform
            .expect_unban()
            .times(1)
            .returning(|_, _| Err(PlatformError::NotFound("Unknown Ban".into())));

        let queue = FutureActionQueue::new();
        let service = service_over(platform, &queue);
        queue.queue_future_action(expired_temp_ban());

        assert_eq!(queue.process_due(&service).await, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_task_saves_after_running_due_actions() {
        let mut platform = MockPlatform::new();
        platform
            .expect_hierarchy()
            .returning(|_, _, _| Ok(roster_hierarchy()));
        platform.expect_unban().times(1).returning(|_, _| Ok(()));

        let dir = std::env::temp_dir().join(format!("gavel-actions-{}", Uuid::new_v4()));
        let path = dir.join("future_actions.yaml");
        let queue = FutureActionQueue::new();
        let pending = other_temp_ban(Duration::hours(1));
        queue.queue_future_action(expired_temp_ban());
        queue.queue_future_action(pending.clone());
        queue.save(&path).await.expect("save");

        let service = service_over(platform, &queue);
        let (tx, handle) = queue.start(service, std::time::Duration::from_secs(3600), path.clone());
        tx.send(QueueRequest::CheckNow).await.expect("task alive");
        tx.send(QueueRequest::Shutdown).await.expect("task alive");
        handle.await.expect("task finished cleanly");

        let saved = FutureActionQueue::load(&path).await.expect("load");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.get(&pending.id), Some(pending));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("gavel-actions-{}.yaml", Uuid::new_v4()));
        let queue = FutureActionQueue::new();
        let action = temp_ban(Duration::days(1));
        queue.queue_future_action(action.clone());
        queue.save(&path).await.expect("save");

        let loaded = FutureActionQueue::load(&path).await.expect("load");
        assert_eq!(loaded.get(&action.id), Some(action));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
