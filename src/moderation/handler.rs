//! Moderation action handlers
//!
//! One handler per [`ModAction`], looked up through [`ActionHandlerRegistry`].
//! Each handler awaits its platform call before announcing or scheduling, so
//! follow-up effects only happen once the primary effect is confirmed.

use crate::guild::GuildStore;
use crate::moderation::platform::{
    Embed, GuildHierarchy, NOTICE_COLOUR, OutgoingMessage, Platform, SUCCESS_COLOUR,
};
use crate::moderation::schedule::{FutureAction, FutureActionKind, Scheduler};
use crate::moderation::{ModAction, ModerationError, ModerationRequest, ModerationResult};
use std::collections::HashMap;
use tracing::{info, warn};

/// Everything a handler may touch while executing one request
pub struct ActionContext<'a> {
    pub platform: &'a dyn Platform,
    pub scheduler: &'a dyn Scheduler,
    pub guilds: &'a GuildStore,
    pub request: &'a ModerationRequest,
    pub hierarchy: &'a GuildHierarchy,
    /// Message history removed alongside a ban
    pub ban_delete_days: u8,
}

impl ActionContext<'_> {
    /// Send `message` to the acting channel, if there is one. Failures are logged only.
    pub async fn announce(&self, message: OutgoingMessage) {
        let Some(channel_id) = self.request.channel_id else {
            return;
        };
        if let Err(e) = self.platform.send_message(channel_id, message).await {
            warn!(
                guild_id = self.request.guild_id,
                channel_id,
                action = %self.request.action,
                "Failed to announce moderation action: {e}"
            );
        }
    }

    /// Register the reversal of a timed action, replacing any pending one of the same kind
    fn schedule_reversal(&self, kind: FutureActionKind) -> ModerationResult<()> {
        let request = self.request;
        let duration = request.duration.ok_or_else(|| {
            ModerationError::InvalidInput(format!("{} requires a duration", request.action))
        })?;
        let action = FutureAction::new(
            kind,
            request.guild_id,
            request.channel_id,
            request.requester_id,
            request.target_id,
            request.reason.clone(),
            duration,
        )?;
        self.cancel_reversal(kind);
        self.scheduler.queue_future_action(action);
        Ok(())
    }

    /// Forget pending reversals of `kind` for the target. A manual action supersedes them.
    fn cancel_reversal(&self, kind: FutureActionKind) {
        self.scheduler
            .cancel_for(self.request.guild_id, self.request.target_id, kind);
    }

    fn reason(&self) -> Option<String> {
        self.request.reason.clone()
    }

    fn muted_role(&self) -> ModerationResult<u64> {
        self.guilds
            .get(self.request.guild_id)
            .muted_role_id
            .ok_or(ModerationError::MutedRoleMissing(self.request.guild_id))
    }
}

/// Trait for executing one kind of moderation action
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    /// Apply the action. Announcements and scheduling happen only after success.
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()>;
}

/// Registry of action handlers
pub struct ActionHandlerRegistry {
    handlers: HashMap<ModAction, Box<dyn ActionHandler>>,
}

impl Default for ActionHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionHandlerRegistry {
    /// Create a new registry with all handlers registered
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(ModAction::Ban, Box::new(BanHandler { force: false }));
        registry.register(ModAction::ForceBan, Box::new(BanHandler { force: true }));
        registry.register(ModAction::TempBan, Box::new(TempBanHandler));
        registry.register(ModAction::Unban, Box::new(UnbanHandler));
        registry.register(ModAction::Mute, Box::new(MuteHandler));
        registry.register(ModAction::TempMute, Box::new(TempMuteHandler));
        registry.register(ModAction::Unmute, Box::new(UnmuteHandler));
        registry.register(ModAction::Kick, Box::new(KickHandler));
        registry.register(ModAction::Warn, Box::new(WarnHandler));

        registry
    }

    /// A registry with nothing registered
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an action
    pub fn register(&mut self, action: ModAction, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(action, handler);
    }

    /// Get a handler for an action
    #[must_use]
    pub fn get(&self, action: ModAction) -> Option<&dyn ActionHandler> {
        self.handlers.get(&action).map(AsRef::as_ref)
    }

    /// Execute the request's action
    ///
    /// # Errors
    ///
    /// Returns [`ModerationError::UnhandledAction`] if no handler is registered,
    /// otherwise whatever the handler reports.
    pub async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let action = ctx.request.action;
        match self.get(action) {
            Some(handler) => handler.execute(ctx).await,
            None => Err(ModerationError::UnhandledAction(action)),
        }
    }
}

/// Handler for bans, by member or by raw identity
pub struct BanHandler {
    pub force: bool,
}

#[async_trait::async_trait]
impl ActionHandler for BanHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        ctx.platform
            .ban(request.guild_id, request.target_id, ctx.ban_delete_days, ctx.reason())
            .await?;

        info!(
            guild_id = request.guild_id,
            target_id = request.target_id,
            force = self.force,
            "Banned user"
        );
        ctx.cancel_reversal(FutureActionKind::TempBan);

        let strike = if self.force { "forcefully struck" } else { "struck" };
        ctx.announce(OutgoingMessage::Embed(
            Embed::new().colour(SUCCESS_COLOUR).description(format!(
                "The ban hammer has been {strike} on {}\nReason: `{}`",
                request.target_mention(),
                request.reason_or_default()
            )),
        ))
        .await;
        Ok(())
    }
}

/// Handler for temporary bans
pub struct TempBanHandler;

#[async_trait::async_trait]
impl ActionHandler for TempBanHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        ctx.platform
            .ban(request.guild_id, request.target_id, ctx.ban_delete_days, ctx.reason())
            .await?;

        ctx.announce(OutgoingMessage::Embed(
            Embed::new().colour(NOTICE_COLOUR).description(format!(
                "The ban hammer has been struck on {} for {}\nReason: `{}`",
                request.target_mention(),
                request.duration_text(),
                request.reason_or_default()
            )),
        ))
        .await;
        ctx.schedule_reversal(FutureActionKind::TempBan)
    }
}

/// Handler for unbans
pub struct UnbanHandler;

#[async_trait::async_trait]
impl ActionHandler for UnbanHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        ctx.platform.unban(request.guild_id, request.target_id).await?;
        ctx.cancel_reversal(FutureActionKind::TempBan);

        ctx.announce(OutgoingMessage::success(
            format!("Unbanned {}!", request.target_mention()),
            request.requester_id,
        ))
        .await;
        Ok(())
    }
}

/// Handler for mutes
pub struct MuteHandler;

#[async_trait::async_trait]
impl ActionHandler for MuteHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        let role_id = ctx.muted_role()?;
        ctx.platform
            .add_role(request.guild_id, request.target_id, role_id, ctx.reason())
            .await?;
        ctx.cancel_reversal(FutureActionKind::TempMute);

        ctx.announce(OutgoingMessage::success(
            format!("Muted {}{}", request.target_mention(), request.quoted_reason()),
            request.requester_id,
        ))
        .await;
        Ok(())
    }
}

/// Handler for temporary mutes
pub struct TempMuteHandler;

#[async_trait::async_trait]
impl ActionHandler for TempMuteHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        let role_id = ctx.muted_role()?;
        ctx.platform
            .add_role(request.guild_id, request.target_id, role_id, ctx.reason())
            .await?;

        ctx.schedule_reversal(FutureActionKind::TempMute)?;
        ctx.announce(OutgoingMessage::success(
            format!(
                "Temporarily Muted {} for {}{}",
                request.target_mention(),
                request.duration_text(),
                request.quoted_reason()
            ),
            request.requester_id,
        ))
        .await;
        Ok(())
    }
}

/// Handler for unmutes
pub struct UnmuteHandler;

#[async_trait::async_trait]
impl ActionHandler for UnmuteHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        let role_id = ctx.muted_role()?;
        let muted = ctx
            .hierarchy
            .target
            .as_ref()
            .is_some_and(|member| member.has_role(role_id));
        if !muted {
            return Err(ModerationError::NotMuted);
        }

        ctx.platform
            .remove_role(request.guild_id, request.target_id, role_id, ctx.reason())
            .await?;
        ctx.cancel_reversal(FutureActionKind::TempMute);

        ctx.announce(OutgoingMessage::success(
            format!("Unmuted {}", request.target_mention()),
            request.requester_id,
        ))
        .await;
        Ok(())
    }
}

/// Handler for kicks
pub struct KickHandler;

#[async_trait::async_trait]
impl ActionHandler for KickHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        ctx.platform
            .kick(request.guild_id, request.target_id, ctx.reason())
            .await?;

        ctx.announce(OutgoingMessage::success(
            format!(
                "{} has been kicked from the server!{}",
                request.target_mention(),
                request.quoted_reason()
            ),
            request.requester_id,
        ))
        .await;
        Ok(())
    }
}

/// Handler for warnings. Local ledger only, no platform mutation.
pub struct WarnHandler;

#[async_trait::async_trait]
impl ActionHandler for WarnHandler {
    async fn execute(&self, ctx: &ActionContext<'_>) -> ModerationResult<()> {
        let request = ctx.request;
        let entry = request.reason.clone().unwrap_or_else(|| {
            format!("No reason provided - action done by <@{}>", request.requester_id)
        });
        let count = ctx
            .guilds
            .add_warning(request.guild_id, request.target_id, entry);

        info!(
            guild_id = request.guild_id,
            target_id = request.target_id,
            count,
            "Warned user"
        );

        ctx.announce(OutgoingMessage::Embed(
            Embed::new().colour(NOTICE_COLOUR).description(format!(
                "\u{26A0} Warned {}{}",
                request.target_mention(),
                request.quoted_reason()
            )),
        ))
        .await;
        Ok(())
    }
}
