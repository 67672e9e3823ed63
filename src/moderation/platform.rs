//! Platform capability interface
//!
//! Everything the moderation engine needs from the chat platform goes through
//! the [`Platform`] trait, so the engine can be driven by serenity in
//! production and by mocks in tests.

use thiserror::Error;

/// Embed colour used for failures
pub const ERROR_COLOUR: u32 = 0xE7_4C_3C;
/// Embed colour used for successful actions
pub const SUCCESS_COLOUR: u32 = 0x2E_CC_71;
/// Embed colour used for neutral notices
pub const NOTICE_COLOUR: u32 = 0xFF_FF_FF;

/// Errors reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The bot lacks the named capability
    #[error("Missing permission: {0}")]
    MissingPermission(String),

    /// Role ordering prevents the operation
    #[error("Role hierarchy prevents this operation")]
    Hierarchy,

    /// Guild, channel, member or role could not be resolved
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other failed request
    #[error("Platform request failed: {0}")]
    Request(String),
}

/// Result type for platform calls
pub type PlatformResult<T> = Result<T, PlatformError>;

/// What the engine knows about a guild member
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberInfo {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    /// Position of the member's highest role, `None` when they have no roles
    pub top_role: Option<i64>,
}

impl MemberInfo {
    #[must_use]
    pub fn new(user_id: u64, top_role: Option<i64>) -> Self {
        Self {
            user_id,
            role_ids: Vec::new(),
            top_role,
        }
    }

    #[must_use]
    pub fn with_roles(mut self, role_ids: Vec<u64>) -> Self {
        self.role_ids = role_ids;
        self
    }

    #[must_use]
    pub fn has_role(&self, role_id: u64) -> bool {
        self.role_ids.contains(&role_id)
    }
}

/// Snapshot of the guild members involved in one moderation action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildHierarchy {
    pub owner_id: u64,
    /// `None` when the requester is not a member
    pub requester: Option<MemberInfo>,
    /// `None` when the target is not a member
    pub target: Option<MemberInfo>,
    /// The bot's own membership
    pub bot: MemberInfo,
}

/// A labelled embed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

/// Platform-neutral rich message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub colour: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = Some(colour);
        self
    }

    #[must_use]
    pub fn field(mut self, field: EmbedField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

/// A message the engine wants delivered to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text(String),
    Embed(Embed),
}

impl OutgoingMessage {
    /// Error style: red embed
    pub fn error(text: impl Into<String>) -> Self {
        Self::Embed(Embed::new().colour(ERROR_COLOUR).description(text))
    }

    /// Success style: green embed crediting the moderator
    pub fn success(text: impl Into<String>, requester_id: u64) -> Self {
        Self::Embed(
            Embed::new()
                .colour(SUCCESS_COLOUR)
                .description(text)
                .footer(format!("Requested by {requester_id}")),
        )
    }

    /// Text visible to a reader, used in logs and tests
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Embed(embed) => embed.description.as_deref().unwrap_or_default(),
        }
    }
}

/// Capabilities consumed from the chat platform
///
/// Every call is asynchronous; dependent work (announcements, modlog entries,
/// reversal scheduling) runs only after the awaited call has succeeded.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    /// Resolve owner, requester, target and bot membership for a guild
    async fn hierarchy(
        &self,
        guild_id: u64,
        requester_id: u64,
        target_id: u64,
    ) -> PlatformResult<GuildHierarchy>;

    /// Ban a user, deleting `delete_message_days` days of their messages
    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_days: u8,
        reason: Option<String>,
    ) -> PlatformResult<()>;

    async fn unban(&self, guild_id: u64, user_id: u64) -> PlatformResult<()>;

    async fn kick(&self, guild_id: u64, user_id: u64, reason: Option<String>)
    -> PlatformResult<()>;

    /// Fails with [`PlatformError::Hierarchy`] when the role sits above the bot's highest role
    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: Option<String>,
    ) -> PlatformResult<()>;

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: Option<String>,
    ) -> PlatformResult<()>;

    async fn send_message(&self, channel_id: u64, message: OutgoingMessage) -> PlatformResult<()>;

    /// Guild a channel belongs to, `None` for unknown or non-guild channels
    async fn channel_guild(&self, channel_id: u64) -> PlatformResult<Option<u64>>;

    /// Members that a prune of `days` would remove
    async fn prunable_count(&self, guild_id: u64, days: u8) -> PlatformResult<u64>;

    /// Prune members inactive for `days`, returning how many were removed
    async fn prune(&self, guild_id: u64, days: u8, reason: Option<String>) -> PlatformResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_styles() {
        let error = OutgoingMessage::error("nope");
        assert_eq!(error.body(), "nope");
        let OutgoingMessage::Embed(embed) = error else {
            panic!("Expected embed");
        };
        assert_eq!(embed.colour, Some(ERROR_COLOUR));

        let success = OutgoingMessage::success("done", 42);
        let OutgoingMessage::Embed(embed) = success else {
            panic!("Expected embed");
        };
        assert_eq!(embed.colour, Some(SUCCESS_COLOUR));
        assert_eq!(embed.footer.as_deref(), Some("Requested by 42"));

        assert_eq!(OutgoingMessage::Text("plain".into()).body(), "plain");
    }

    #[test]
    fn test_member_roles() {
        let member = MemberInfo::new(1, Some(3)).with_roles(vec![10, 11]);
        assert!(member.has_role(11));
        assert!(!member.has_role(12));
    }
}
