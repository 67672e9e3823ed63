//! Error types for the moderation engine
//!
//! This module defines the errors that can occur while validating and executing
//! moderation actions, and the user-facing text each one produces.

use crate::BOT_NAME;
use crate::moderation::ModAction;
use crate::moderation::platform::PlatformError;
use thiserror::Error;

/// Reasons an action is refused before anything is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Target is not a member of the guild")]
    NotMember,

    #[error("Target is the guild owner")]
    TargetIsOwner,

    #[error("Target is the requester")]
    SelfTarget,

    #[error("Target outranks the requester")]
    OutranksRequester,

    #[error("Target outranks the bot")]
    OutranksBot,
}

impl Denial {
    /// Channel text for this denial
    #[must_use]
    pub fn message(self, action: ModAction, target_id: u64) -> String {
        let verb = action.lowercase_name();
        match self {
            Self::NotMember => {
                "That user isn't in this guild! You can try to forceban the user if needed.".to_string()
            }
            Self::TargetIsOwner => {
                format!("Cannot {verb} <@{target_id}> because they're the guild owner!")
            }
            Self::SelfTarget => format!("You cannot {verb} yourself you daft person!"),
            Self::OutranksRequester => {
                format!("You cannot {verb} a user who is higher than you in the role hierarchy!")
            }
            Self::OutranksBot => format!(
                "Cannot {verb} <@{target_id}>! Their highest role is higher than my highest role or they're the guild owner."
            ),
        }
    }
}

/// Errors that can occur during moderation operations
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Malformed arguments, e.g. a zero duration
    #[error("{0}")]
    InvalidInput(String),

    /// One of the ordered authorization checks failed
    #[error("Action denied: {0}")]
    Denied(#[from] Denial),

    /// The bot lacks a capability the platform requires
    #[error("Missing permission: {0}")]
    MissingPermission(String),

    /// Role ordering prevents the operation
    #[error("Role hierarchy conflict")]
    Hierarchy,

    /// Unmute requested for a member without the muted role
    #[error("Target is not muted")]
    NotMuted,

    /// The guild has no muted role configured
    #[error("No muted role configured for guild {0}")]
    MutedRoleMissing(u64),

    /// Any other platform failure
    #[error("Platform error: {0}")]
    Platform(PlatformError),

    /// No handler is registered for the action
    #[error("No handler registered for action: {0}")]
    UnhandledAction(ModAction),
}

impl From<PlatformError> for ModerationError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::MissingPermission(permission) => Self::MissingPermission(permission),
            PlatformError::Hierarchy => Self::Hierarchy,
            other => Self::Platform(other),
        }
    }
}

impl ModerationError {
    /// Channel text for recoverable failures, `None` for errors that propagate
    #[must_use]
    pub fn user_message(&self, action: ModAction, target_id: u64) -> Option<String> {
        let verb = action.lowercase_name();
        match self {
            Self::InvalidInput(message) => Some(message.clone()),
            Self::Denied(denial) => Some(denial.message(action, target_id)),
            Self::MissingPermission(permission) => Some(format!(
                "Cannot {verb} <@{target_id}>! I do not have the `{permission}` permission!"
            )),
            Self::Hierarchy => Some(match action {
                ModAction::Mute | ModAction::TempMute => format!(
                    "Cannot apply the mute role, make sure it is below {BOT_NAME} in the role hierarchy."
                ),
                _ => format!("Cannot {verb} <@{target_id}>! The role hierarchy prevents it."),
            }),
            Self::NotMuted => Some("That user isn't muted!!".to_string()),
            Self::MutedRoleMissing(_) => {
                Some("This server has no muted role configured!".to_string())
            }
            Self::Platform(_) | Self::UnhandledAction(_) => None,
        }
    }

    /// Whether the failure was recovered by telling the user
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Platform(_) | Self::UnhandledAction(_))
    }

    /// Whether running the same action again later may succeed.
    ///
    /// Request failures, missing permissions and role ordering can be fixed on
    /// the platform side. Anything that describes the target or the guild
    /// configuration, including an unknown user or ban, will fail the same way.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Platform(PlatformError::Request(_)) | Self::MissingPermission(_) | Self::Hierarchy
        )
    }
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModerationError::from(Denial::SelfTarget);
        assert_eq!(error.to_string(), "Action denied: Target is the requester");

        let error = ModerationError::UnhandledAction(ModAction::Warn);
        assert_eq!(error.to_string(), "No handler registered for action: Warn");
    }

    #[test]
    fn test_platform_error_conversion() {
        assert!(matches!(
            ModerationError::from(PlatformError::MissingPermission("Ban Members".into())),
            ModerationError::MissingPermission(p) if p == "Ban Members"
        ));
        assert!(matches!(
            ModerationError::from(PlatformError::Hierarchy),
            ModerationError::Hierarchy
        ));
        assert!(matches!(
            ModerationError::from(PlatformError::Request("boom".into())),
            ModerationError::Platform(_)
        ));
    }

    #[test]
    fn test_user_messages() {
        let missing = ModerationError::MissingPermission("Ban Members".into());
        assert_eq!(
            missing.user_message(ModAction::Ban, 7).as_deref(),
            Some("Cannot ban <@7>! I do not have the `Ban Members` permission!")
        );

        let denial = ModerationError::Denied(Denial::SelfTarget);
        assert_eq!(
            denial.user_message(ModAction::TempBan, 7).as_deref(),
            Some("You cannot temp ban yourself you daft person!")
        );

        let hierarchy = ModerationError::Hierarchy;
        assert!(hierarchy
            .user_message(ModAction::Mute, 7)
            .is_some_and(|m| m.starts_with("Cannot apply the mute role")));

        let fatal = ModerationError::UnhandledAction(ModAction::Kick);
        assert!(fatal.user_message(ModAction::Kick, 7).is_none());
        assert!(!fatal.is_user_facing());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ModerationError::from(PlatformError::Request("timeout".into())).is_retryable());
        assert!(ModerationError::MissingPermission("Ban Members".into()).is_retryable());
        assert!(ModerationError::Hierarchy.is_retryable());

        let unknown_ban = ModerationError::from(PlatformError::NotFound("Unknown Ban".into()));
        assert!(!unknown_ban.is_retryable());
        assert!(!ModerationError::NotMuted.is_retryable());
        assert!(!ModerationError::MutedRoleMissing(1).is_retryable());
        assert!(!ModerationError::UnhandledAction(ModAction::Unban).is_retryable());
    }
}
