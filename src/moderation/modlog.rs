//! Modlog publishing
//!
//! Routes action records to the channel a guild configured for each event, as
//! an embed or as a single compact line.

use crate::guild::GuildWrapper;
use crate::moderation::ModlogEvent;
use crate::moderation::platform::{EmbedField, OutgoingMessage, Platform};
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes events to guild modlog channels
#[derive(Clone)]
pub struct ModlogPublisher {
    platform: Arc<dyn Platform>,
}

impl ModlogPublisher {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Publish `event` for `target` to the guild's modlog.
    ///
    /// Silently does nothing when the event is disabled, has no channel, or
    /// the channel belongs to another guild. Delivery failures are logged only.
    pub async fn publish(
        &self,
        guild: &GuildWrapper,
        event: ModlogEvent,
        target_id: u64,
        responsible_id: Option<u64>,
        reason: Option<&str>,
        extra_fields: &[EmbedField],
    ) {
        let Some(channel_id) = self.modlog_channel(guild, event).await else {
            return;
        };

        let message = if guild.is_event_compacted(event) {
            let text = compact_text(event, target_id, responsible_id, reason, extra_fields);
            OutgoingMessage::Text(text)
        } else {
            let mut embed = event.event_embed(target_id, responsible_id, reason);
            embed.fields.extend(extra_fields.iter().cloned());
            OutgoingMessage::Embed(embed)
        };

        if let Err(e) = self.platform.send_message(channel_id, message).await {
            warn!(
                guild_id = guild.guild_id,
                channel_id,
                event = %event,
                "Failed to post to modlog: {e}"
            );
        }
    }

    /// Publish an event no moderator is responsible for, such as an expired timed action
    pub async fn publish_event(
        &self,
        guild: &GuildWrapper,
        event: ModlogEvent,
        target_id: u64,
        reason: Option<&str>,
        extra_fields: &[EmbedField],
    ) {
        self.publish(guild, event, target_id, None, reason, extra_fields)
            .await;
    }

    /// The modlog channel for `event`, if enabled and inside this guild
    async fn modlog_channel(&self, guild: &GuildWrapper, event: ModlogEvent) -> Option<u64> {
        if !guild.is_event_enabled(event) {
            return None;
        }
        let channel_id = guild.modlog_channel(event)?;

        match self.platform.channel_guild(channel_id).await {
            Ok(Some(owner)) if owner == guild.guild_id => Some(channel_id),
            Ok(owner) => {
                debug!(
                    guild_id = guild.guild_id,
                    channel_id,
                    ?owner,
                    "Modlog channel is not in this guild, skipping"
                );
                None
            }
            Err(e) => {
                warn!(
                    guild_id = guild.guild_id,
                    channel_id,
                    "Failed to resolve modlog channel: {e}"
                );
                None
            }
        }
    }
}

fn compact_text(
    event: ModlogEvent,
    target_id: u64,
    responsible_id: Option<u64>,
    reason: Option<&str>,
    extra_fields: &[EmbedField],
) -> String {
    let mut text = event.event_text(target_id, responsible_id, reason);
    if !extra_fields.is_empty() {
        text.push('\n');
        for field in extra_fields {
            text.push_str(&format!("**{}**: {}\t", field.name, field.value));
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::platform::{MockPlatform, PlatformError};
    use mockall::predicate::eq;

    const GUILD: u64 = 10;
    const CHANNEL: u64 = 20;

    fn guild(compact: bool) -> GuildWrapper {
        let mut guild = GuildWrapper::new(GUILD);
        guild.enable_event(ModlogEvent::UserBanned, CHANNEL, compact);
        guild
    }

    #[tokio::test]
    async fn test_disabled_event_is_noop() {
        // No expectations: any platform call would panic
        let publisher = ModlogPublisher::new(Arc::new(MockPlatform::new()));
        publisher
            .publish(&guild(false), ModlogEvent::UserKicked, 1, Some(2), None, &[])
            .await;
    }

    #[tokio::test]
    async fn test_cross_guild_channel_is_skipped() {
        let mut platform = MockPlatform::new();
        platform
            .expect_channel_guild()
            .with(eq(CHANNEL))
            .times(1)
            .returning(|_| Ok(Some(GUILD + 1)));
        let publisher = ModlogPublisher::new(Arc::new(platform));
        publisher
            .publish(&guild(false), ModlogEvent::UserBanned, 1, Some(2), None, &[])
            .await;
    }

    #[tokio::test]
    async fn test_verbose_embed_with_extra_fields() {
        let mut platform = MockPlatform::new();
        platform
            .expect_channel_guild()
            .returning(|_| Ok(Some(GUILD)));
        platform
            .expect_send_message()
            .withf(|channel, message| {
                let OutgoingMessage::Embed(embed) = message else {
                    return false;
                };
                *channel == CHANNEL
                    && embed.title.as_deref() == Some("User Banned")
                    && embed
                        .fields
                        .last()
                        .is_some_and(|f| f.name == "Duration" && f.value == "1 day")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let publisher = ModlogPublisher::new(Arc::new(platform));
        publisher
            .publish(
                &guild(false),
                ModlogEvent::UserBanned,
                1,
                Some(2),
                Some("spam"),
                &[EmbedField::new("Duration", "1 day")],
            )
            .await;
    }

    #[tokio::test]
    async fn test_compact_line() {
        let mut platform = MockPlatform::new();
        platform
            .expect_channel_guild()
            .returning(|_| Ok(Some(GUILD)));
        platform
            .expect_send_message()
            .with(
                eq(CHANNEL),
                eq(OutgoingMessage::Text(
                    "**User Banned**: <@1> (`1`) | Responsible: <@2> | Reason: spam\n\
                     **Duration**: 1 day"
                        .to_string(),
                )),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let publisher = ModlogPublisher::new(Arc::new(platform));
        publisher
            .publish(
                &guild(true),
                ModlogEvent::UserBanned,
                1,
                Some(2),
                Some("spam"),
                &[EmbedField::new("Duration", "1 day")],
            )
            .await;
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let mut platform = MockPlatform::new();
        platform
            .expect_channel_guild()
            .returning(|_| Ok(Some(GUILD)));
        platform
            .expect_send_message()
            .withf(|_, message| message.body() == "**User Banned**: <@1> (`1`) | Reason: expired")
            .times(1)
            .returning(|_, _| Err(PlatformError::Request("down".into())));

        let publisher = ModlogPublisher::new(Arc::new(platform));
        publisher
            .publish_event(&guild(true), ModlogEvent::UserBanned, 1, Some("expired"), &[])
            .await;
    }
}
