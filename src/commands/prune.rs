//! Two-step server prune
//!
//! `prune server <days>` reports how many members would be removed and stores
//! the prune as a pending confirmation. `prune confirm` runs it.

use super::{reply, usage_message};
use crate::confirm::ConfirmationRegistry;
use crate::moderation::platform::{Embed, ERROR_COLOUR, OutgoingMessage, Platform, PlatformResult};
use crate::moderation::format_duration;
use crate::usage::{format_usage, match_usage};
use crate::{Context, Error};
use poise::command;
use tracing::info;

pub const PRUNE_USAGE: &str = "`{prefix}prune server <days>` - Prunes the entire server. \
                               Only members inactive longer than the specified amount of days will be removed\n\
                               `{prefix}prune confirm` - Confirms a pending prune";

/// A prune awaiting confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrune {
    pub guild_id: u64,
    pub days: u8,
    pub reason: String,
}

/// Outcome of one `prune` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneReply {
    /// Arguments fit no subcommand; carries the relevant usage lines
    Usage(Vec<String>),
    InvalidDays,
    ZeroDays,
    AwaitingConfirmation { count: u64 },
    Pruned { count: u64 },
    NothingToConfirm,
}

impl PruneReply {
    #[must_use]
    pub fn into_message(
        self,
        prefix: &str,
        window: Option<chrono::Duration>,
        requester_id: u64,
    ) -> OutgoingMessage {
        match self {
            Self::Usage(lines) => usage_message(
                lines
                    .iter()
                    .map(|line| format_usage(line, prefix))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::InvalidDays => OutgoingMessage::error("Please enter a valid amount of days!"),
            Self::ZeroDays => OutgoingMessage::error("The amount of days has to be more than 0!"),
            Self::AwaitingConfirmation { count } => {
                let within = window
                    .map(|window| format!(" within {}", format_duration(window)))
                    .unwrap_or_default();
                OutgoingMessage::Embed(
                    Embed::new()
                        .colour(ERROR_COLOUR)
                        .description(format!(
                            "Are you sure you want to prune {count} members?\n\
                             To confirm type `{prefix}prune confirm`{within}!"
                        ))
                        .footer(format!("Requested by {requester_id}")),
                )
            }
            Self::Pruned { count } => {
                OutgoingMessage::success(format!("Pruned {count} members!"), requester_id)
            }
            Self::NothingToConfirm => {
                OutgoingMessage::error("You haven't got any action to confirm!")
            }
        }
    }
}

/// Confirmation key for a user's prune in a guild
fn classifier(guild_id: u64) -> String {
    format!("prune:{guild_id}")
}

/// Decide and perform one `prune` invocation
///
/// # Errors
/// Returns the platform failure when counting or pruning fails.
pub async fn handle_prune(
    platform: &dyn Platform,
    confirmations: &ConfirmationRegistry<PendingPrune>,
    guild_id: u64,
    actor_id: u64,
    args: &[&str],
) -> PlatformResult<PruneReply> {
    match args {
        [sub, days] if sub.eq_ignore_ascii_case("server") => {
            let Ok(days) = days.parse::<u8>() else {
                return Ok(PruneReply::InvalidDays);
            };
            if days == 0 {
                return Ok(PruneReply::ZeroDays);
            }

            let count = platform.prunable_count(guild_id, days).await?;
            confirmations.push(
                actor_id,
                classifier(guild_id),
                PendingPrune {
                    guild_id,
                    days,
                    reason: format!("Pruned by user: <@{actor_id}>"),
                },
            );
            Ok(PruneReply::AwaitingConfirmation { count })
        }
        [sub, ..] if sub.eq_ignore_ascii_case("confirm") => {
            let Some(pending) = confirmations.take(actor_id, &classifier(guild_id)) else {
                return Ok(PruneReply::NothingToConfirm);
            };
            let count = platform
                .prune(pending.guild_id, pending.days, Some(pending.reason))
                .await?;
            info!(guild_id, actor_id, days = pending.days, count, "Confirmed prune");
            Ok(PruneReply::Pruned { count })
        }
        _ => {
            let lines = match_usage(PRUNE_USAGE, "prune", args);
            let lines = if lines.is_empty() {
                PRUNE_USAGE.lines().collect()
            } else {
                lines
            };
            Ok(PruneReply::Usage(lines.into_iter().map(str::to_string).collect()))
        }
    }
}

/// Prune inactive members, after confirmation
#[command(
    prefix_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    category = "Moderation"
)]
pub async fn prune(
    ctx: Context<'_>,
    #[rest]
    #[description = "server <days> | confirm"]
    args: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(super::GUILD_ONLY)?;
    let data = ctx.data();
    let args = args.unwrap_or_default();
    let args: Vec<&str> = args.split_whitespace().collect();

    let outcome = handle_prune(
        data.platform.as_ref(),
        &data.confirmations,
        guild_id.get(),
        ctx.author().id.get(),
        &args,
    )
    .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(crate::moderation::PlatformError::MissingPermission(permission)) => {
            let text = format!("I do not have the `{permission}` permission!");
            return reply(ctx, OutgoingMessage::error(text)).await;
        }
        Err(e) => return Err(e.into()),
    };

    let message = outcome.into_message(
        &data.config.prefix,
        data.config.confirmation_window(),
        ctx.author().id.get(),
    );
    reply(ctx, message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::platform::MockPlatform;
    use mockall::predicate::{always, eq};

    const GUILD: u64 = 10;
    const ACTOR: u64 = 20;

    #[tokio::test]
    async fn test_prune_then_confirm_once() {
        let mut platform = MockPlatform::new();
        platform
            .expect_prunable_count()
            .with(eq(GUILD), eq(5))
            .times(1)
            .returning(|_, _| Ok(12));
        platform
            .expect_prune()
            .with(eq(GUILD), eq(5), always())
            .times(1)
            .returning(|_, _, _| Ok(12));
        let confirmations = ConfirmationRegistry::new();

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["server", "5"])
            .await
            .expect("count succeeds");
        assert_eq!(reply, PruneReply::AwaitingConfirmation { count: 12 });
        assert!(confirmations.exists(ACTOR, &classifier(GUILD)));

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["confirm"])
            .await
            .expect("prune succeeds");
        assert_eq!(reply, PruneReply::Pruned { count: 12 });
        assert!(!confirmations.exists(ACTOR, &classifier(GUILD)));

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["confirm"])
            .await
            .expect("nothing to do");
        assert_eq!(reply, PruneReply::NothingToConfirm);
        assert_eq!(
            reply.into_message("!", None, ACTOR).body(),
            "You haven't got any action to confirm!"
        );
    }

    #[tokio::test]
    async fn test_confirm_is_per_user() {
        let mut platform = MockPlatform::new();
        platform.expect_prunable_count().returning(|_, _| Ok(3));
        platform.expect_prune().times(0);
        let confirmations = ConfirmationRegistry::new();

        handle_prune(&platform, &confirmations, GUILD, ACTOR, &["SERVER", "7"])
            .await
            .expect("count succeeds");
        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR + 1, &["confirm"])
            .await
            .expect("nothing to do");
        assert_eq!(reply, PruneReply::NothingToConfirm);
    }

    #[tokio::test]
    async fn test_invalid_days() {
        let platform = MockPlatform::new();
        let confirmations = ConfirmationRegistry::new();

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["server", "soon"])
            .await
            .expect("no platform call");
        assert_eq!(reply, PruneReply::InvalidDays);

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["server", "0"])
            .await
            .expect("no platform call");
        assert_eq!(reply, PruneReply::ZeroDays);
        assert!(confirmations.is_empty());
    }

    #[tokio::test]
    async fn test_usage_for_unknown_arguments() {
        let platform = MockPlatform::new();
        let confirmations = ConfirmationRegistry::new();

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &["server"])
            .await
            .expect("no platform call");
        let PruneReply::Usage(lines) = reply else {
            panic!("Expected usage");
        };
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("`{prefix}prune server <days>`"));

        let reply = handle_prune(&platform, &confirmations, GUILD, ACTOR, &[])
            .await
            .expect("no platform call");
        assert_eq!(reply, PruneReply::Usage(PRUNE_USAGE.lines().map(str::to_string).collect()));
    }

    #[test]
    fn test_confirmation_prompt() {
        let message = PruneReply::AwaitingConfirmation { count: 4 }.into_message(
            "?",
            Some(chrono::Duration::minutes(1)),
            ACTOR,
        );
        assert_eq!(
            message.body(),
            "Are you sure you want to prune 4 members?\nTo confirm type `?prune confirm` within 1 minute!"
        );
    }
}
