//! Moderation service
//!
//! Entry point for every moderation action: validates the request, runs the
//! ordered authorization checks, dispatches to the handler and records the
//! outcome in the modlog.

use crate::MODERATION_TARGET;
use crate::guild::GuildStore;
use crate::moderation::authorizer::authorize;
use crate::moderation::handler::{ActionContext, ActionHandlerRegistry};
use crate::moderation::modlog::ModlogPublisher;
use crate::moderation::platform::{EmbedField, GuildHierarchy, OutgoingMessage, Platform};
use crate::moderation::schedule::{FutureAction, Scheduler, expiry_after};
use crate::moderation::{ModerationError, ModerationRequest, ModerationResult};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Days of message history removed alongside a ban
pub const DEFAULT_BAN_DELETE_DAYS: u8 = 7;

/// Service for moderation operations
#[derive(Clone)]
pub struct ModerationService {
    platform: Arc<dyn Platform>,
    scheduler: Arc<dyn Scheduler>,
    guilds: GuildStore,
    handlers: Arc<ActionHandlerRegistry>,
    modlog: ModlogPublisher,
    ban_delete_days: u8,
}

impl ModerationService {
    /// Create a service with every handler registered
    pub fn new(
        platform: Arc<dyn Platform>,
        scheduler: Arc<dyn Scheduler>,
        guilds: GuildStore,
    ) -> Self {
        Self {
            modlog: ModlogPublisher::new(Arc::clone(&platform)),
            platform,
            scheduler,
            guilds,
            handlers: Arc::new(ActionHandlerRegistry::new()),
            ban_delete_days: DEFAULT_BAN_DELETE_DAYS,
        }
    }

    #[must_use]
    pub fn with_ban_delete_days(mut self, days: u8) -> Self {
        self.ban_delete_days = days;
        self
    }

    /// Validate, authorize and execute a moderation request.
    ///
    /// Recoverable failures are reported to the request's channel before being
    /// returned; check [`ModerationError::is_user_facing`] to tell them apart.
    ///
    /// # Errors
    /// Returns the validation, authorization or execution failure.
    pub async fn handle_action(&self, request: &ModerationRequest) -> ModerationResult<()> {
        let result = self.authorize_and_execute(request).await;
        if let Err(e) = &result {
            self.report_failure(request, e).await;
        }
        result
    }

    async fn authorize_and_execute(&self, request: &ModerationRequest) -> ModerationResult<()> {
        validate(request)?;
        let hierarchy = self
            .platform
            .hierarchy(request.guild_id, request.requester_id, request.target_id)
            .await?;
        authorize(request, &hierarchy)?;
        self.run_handler(request, &hierarchy).await?;

        info!(
            target: MODERATION_TARGET,
            action = %request.action,
            guild_id = request.guild_id,
            requester_id = request.requester_id,
            target_id = request.target_id,
            reason = request.reason_or_default(),
            "Moderation action applied"
        );

        let extra_fields: Vec<EmbedField> = request
            .duration
            .filter(|_| request.action.is_timed())
            .map(|_| EmbedField::new("Duration", request.duration_text()))
            .into_iter()
            .collect();
        self.modlog
            .publish(
                &self.guilds.get(request.guild_id),
                request.action.event(),
                request.target_id,
                Some(request.requester_id),
                request.reason.as_deref(),
                &extra_fields,
            )
            .await;
        Ok(())
    }

    async fn run_handler(
        &self,
        request: &ModerationRequest,
        hierarchy: &GuildHierarchy,
    ) -> ModerationResult<()> {
        let ctx = ActionContext {
            platform: self.platform.as_ref(),
            scheduler: self.scheduler.as_ref(),
            guilds: &self.guilds,
            request,
            hierarchy,
            ban_delete_days: self.ban_delete_days,
        };
        self.handlers.execute(&ctx).await
    }

    /// Perform the reversal of an expired timed action.
    ///
    /// Authorization is not repeated: the original action already passed it and
    /// the target may have left the guild since. The modlog entry has no
    /// responsible moderator and names the original one as a field instead.
    ///
    /// # Errors
    /// Returns the platform or handler failure.
    pub async fn reverse(&self, action: &FutureAction) -> ModerationResult<()> {
        let request = ModerationRequest::new(
            action.kind.reversal(),
            action.guild_id,
            action.responsible_id,
            action.target_id,
        )
        .with_reason(Some(format!("{} expired", action.kind)));

        let hierarchy = self
            .platform
            .hierarchy(request.guild_id, request.requester_id, request.target_id)
            .await?;
        info!(
            target: MODERATION_TARGET,
            action_id = %action.id,
            kind = %action.kind,
            guild_id = action.guild_id,
            target_id = action.target_id,
            "Reversing expired action"
        );
        self.run_handler(&request, &hierarchy).await?;

        let extra_fields = [
            EmbedField::new("Original Moderator", format!("<@{}>", action.responsible_id)),
            EmbedField::new("Duration", action.duration_text.clone()),
        ];
        self.modlog
            .publish_event(
                &self.guilds.get(action.guild_id),
                request.action.event(),
                action.target_id,
                request.reason.as_deref(),
                &extra_fields,
            )
            .await;
        Ok(())
    }

    async fn report_failure(&self, request: &ModerationRequest, error: &ModerationError) {
        let Some(text) = error.user_message(request.action, request.target_id) else {
            error!(
                target: MODERATION_TARGET,
                action = %request.action,
                guild_id = request.guild_id,
                target_id = request.target_id,
                "Moderation action failed: {error}"
            );
            return;
        };

        info!(
            target: MODERATION_TARGET,
            action = %request.action,
            guild_id = request.guild_id,
            target_id = request.target_id,
            "Moderation action refused: {error}"
        );
        let Some(channel_id) = request.channel_id else {
            return;
        };
        if let Err(e) = self
            .platform
            .send_message(channel_id, OutgoingMessage::error(text))
            .await
        {
            warn!(
                guild_id = request.guild_id,
                channel_id,
                "Failed to report moderation failure: {e}"
            );
        }
    }
}

/// Input checks that need no platform state
fn validate(request: &ModerationRequest) -> ModerationResult<()> {
    if request.action.is_timed() {
        match request.duration {
            Some(duration) if duration > chrono::Duration::zero() => {
                expiry_after(duration)?;
            }
            _ => {
                return Err(ModerationError::InvalidInput(
                    "The duration has to be more than 0!".to_string(),
                ));
            }
        }
    }
    Ok(())
}
