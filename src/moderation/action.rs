//! Moderation action types
//!
//! This module defines the closed set of moderation actions, the modlog events
//! they produce, and the request describing one invocation.

use crate::moderation::duration::format_duration;
use crate::moderation::platform::{Embed, EmbedField};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason shown when the moderator gave none
pub const NO_REASON: &str = "No Reason Given";

/// Type of moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModAction {
    Ban,
    /// Ban by raw identity, the target need not be a member
    ForceBan,
    TempBan,
    Unban,
    Mute,
    TempMute,
    Unmute,
    Kick,
    Warn,
}

impl ModAction {
    pub const ALL: [Self; 9] = [
        Self::Ban,
        Self::ForceBan,
        Self::TempBan,
        Self::Unban,
        Self::Mute,
        Self::TempMute,
        Self::Unmute,
        Self::Kick,
        Self::Warn,
    ];

    /// Display name, e.g. "Temp Ban"
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ban => "Ban",
            Self::ForceBan => "Force Ban",
            Self::TempBan => "Temp Ban",
            Self::Unban => "Unban",
            Self::Mute => "Mute",
            Self::TempMute => "Temp Mute",
            Self::Unmute => "Unmute",
            Self::Kick => "Kick",
            Self::Warn => "Warn",
        }
    }

    /// Verb used in user-facing sentences, e.g. "temp ban"
    #[must_use]
    pub fn lowercase_name(self) -> String {
        self.name().to_lowercase()
    }

    /// Modlog event recorded for this action
    #[must_use]
    pub fn event(self) -> ModlogEvent {
        match self {
            Self::Ban | Self::ForceBan => ModlogEvent::UserBanned,
            Self::TempBan => ModlogEvent::UserTempBanned,
            Self::Unban => ModlogEvent::UserUnbanned,
            Self::Mute => ModlogEvent::UserMuted,
            Self::TempMute => ModlogEvent::UserTempMuted,
            Self::Unmute => ModlogEvent::UserUnmuted,
            Self::Kick => ModlogEvent::UserKicked,
            Self::Warn => ModlogEvent::UserWarned,
        }
    }

    /// Whether the action carries a duration and schedules a reversal
    #[must_use]
    pub fn is_timed(self) -> bool {
        matches!(self, Self::TempBan | Self::TempMute)
    }

    /// Whether the target may be someone outside the member roster
    #[must_use]
    pub fn operates_outside_roster(self) -> bool {
        matches!(self, Self::ForceBan | Self::Unban)
    }
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events that can be published to a guild's modlog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModlogEvent {
    UserBanned,
    UserTempBanned,
    UserUnbanned,
    UserMuted,
    UserTempMuted,
    UserUnmuted,
    UserKicked,
    UserWarned,
}

impl ModlogEvent {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::UserBanned => "User Banned",
            Self::UserTempBanned => "User Temporarily Banned",
            Self::UserUnbanned => "User Unbanned",
            Self::UserMuted => "User Muted",
            Self::UserTempMuted => "User Temporarily Muted",
            Self::UserUnmuted => "User Unmuted",
            Self::UserKicked => "User Kicked",
            Self::UserWarned => "User Warned",
        }
    }

    #[must_use]
    pub fn colour(self) -> u32 {
        match self {
            Self::UserBanned | Self::UserTempBanned | Self::UserKicked => 0xE7_4C_3C,
            Self::UserMuted | Self::UserTempMuted | Self::UserWarned => 0xE6_7E_22,
            Self::UserUnbanned | Self::UserUnmuted => 0x2E_CC_71,
        }
    }

    /// Single-line rendering used by compact modlogs
    #[must_use]
    pub fn event_text(
        self,
        target_id: u64,
        responsible_id: Option<u64>,
        reason: Option<&str>,
    ) -> String {
        let mut text = format!("**{}**: <@{target_id}> (`{target_id}`)", self.title());
        if let Some(responsible_id) = responsible_id {
            text.push_str(&format!(" | Responsible: <@{responsible_id}>"));
        }
        text.push_str(&format!(" | Reason: {}", reason.unwrap_or(NO_REASON)));
        text
    }

    /// Embed rendering used by verbose modlogs
    #[must_use]
    pub fn event_embed(
        self,
        target_id: u64,
        responsible_id: Option<u64>,
        reason: Option<&str>,
    ) -> Embed {
        let mut embed = Embed::new()
            .title(self.title())
            .colour(self.colour())
            .field(EmbedField::new("User", format!("<@{target_id}> (`{target_id}`)")));
        if let Some(responsible_id) = responsible_id {
            embed = embed.field(EmbedField::new("Responsible", format!("<@{responsible_id}>")));
        }
        embed.field(EmbedField {
            name: "Reason".to_string(),
            value: reason.unwrap_or(NO_REASON).to_string(),
            inline: false,
        })
    }
}

impl fmt::Display for ModlogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One moderation invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationRequest {
    pub action: ModAction,
    pub guild_id: u64,
    pub requester_id: u64,
    pub target_id: u64,
    /// Channel for success and error reporting
    pub channel_id: Option<u64>,
    pub reason: Option<String>,
    /// Only meaningful for timed actions
    pub duration: Option<Duration>,
}

impl ModerationRequest {
    #[must_use]
    pub fn new(action: ModAction, guild_id: u64, requester_id: u64, target_id: u64) -> Self {
        Self {
            action,
            guild_id,
            requester_id,
            target_id,
            channel_id: None,
            reason: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn in_channel(mut self, channel_id: impl Into<Option<u64>>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<Option<String>>) -> Self {
        self.reason = reason.into().filter(|reason| !reason.trim().is_empty());
        self
    }

    #[must_use]
    pub fn for_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or(NO_REASON)
    }

    /// Reason wrapped for inline display, e.g. `` (`spam`)``, or empty
    #[must_use]
    pub fn quoted_reason(&self) -> String {
        self.reason
            .as_deref()
            .map(|reason| format!(" (`{}`)", reason.replace('`', "'")))
            .unwrap_or_default()
    }

    /// Human-friendly duration, empty when absent
    #[must_use]
    pub fn duration_text(&self) -> String {
        self.duration.map(format_duration).unwrap_or_default()
    }

    #[must_use]
    pub fn target_mention(&self) -> String {
        format!("<@{}>", self.target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        assert_eq!(ModAction::ForceBan.name(), "Force Ban");
        assert_eq!(ModAction::TempMute.lowercase_name(), "temp mute");
        assert_eq!(ModAction::Kick.to_string(), "Kick");
    }

    #[test]
    fn test_action_events() {
        assert_eq!(ModAction::Ban.event(), ModlogEvent::UserBanned);
        assert_eq!(ModAction::ForceBan.event(), ModlogEvent::UserBanned);
        assert_eq!(ModAction::TempBan.event(), ModlogEvent::UserTempBanned);
        assert_eq!(ModAction::Warn.event(), ModlogEvent::UserWarned);
    }

    #[test]
    fn test_action_classification() {
        let timed: Vec<_> = ModAction::ALL.into_iter().filter(|a| a.is_timed()).collect();
        assert_eq!(timed, vec![ModAction::TempBan, ModAction::TempMute]);

        assert!(ModAction::ForceBan.operates_outside_roster());
        assert!(ModAction::Unban.operates_outside_roster());
        assert!(!ModAction::Ban.operates_outside_roster());
    }

    #[test]
    fn test_request_reason_display() {
        let request = ModerationRequest::new(ModAction::Kick, 1, 2, 3);
        assert_eq!(request.reason_or_default(), NO_REASON);
        assert_eq!(request.quoted_reason(), "");

        let request = request.with_reason(Some("said `hi`".to_string()));
        assert_eq!(request.quoted_reason(), " (`said 'hi'`)");

        let blank =
            ModerationRequest::new(ModAction::Kick, 1, 2, 3).with_reason(Some("  ".to_string()));
        assert!(blank.reason.is_none());
    }

    #[test]
    fn test_event_text() {
        let text = ModlogEvent::UserKicked.event_text(5, Some(6), None);
        assert_eq!(
            text,
            "**User Kicked**: <@5> (`5`) | Responsible: <@6> | Reason: No Reason Given"
        );
    }

    #[test]
    fn test_event_embed() {
        let embed = ModlogEvent::UserWarned.event_embed(5, None, Some("spam"));
        assert_eq!(embed.title.as_deref(), Some("User Warned"));
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[1].value, "spam");
    }
}
