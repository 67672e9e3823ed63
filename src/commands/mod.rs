//! Prefix commands
//!
//! Every moderation command funnels into [`run_action`], which hands the request
//! to the moderation service and persists guild state afterwards.

pub mod moderation;
pub mod prune;

use crate::moderation::platform::{Embed, ERROR_COLOUR, OutgoingMessage};
use crate::moderation::{ModAction, ModerationRequest};
use crate::usage::{format_usage, match_usage};
use crate::{Context, Data, Error, logging};
use poise::FrameworkError;
use poise::serenity_prelude as serenity;
use tracing::warn;

const GUILD_ONLY: &str = "This command can only be used in a server";

/// All commands, for registration with the framework
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        moderation::ban(),
        moderation::forceban(),
        moderation::tempban(),
        moderation::unban(),
        moderation::mute(),
        moderation::tempmute(),
        moderation::unmute(),
        moderation::kick(),
        moderation::warn(),
        moderation::warnings(),
        prune::prune(),
    ]
}

/// Usage text of a command, with `{prefix}` placeholders
#[must_use]
pub fn usage_for(command: &str) -> Option<&'static str> {
    let usage = match command {
        "ban" => moderation::BAN_USAGE,
        "forceban" => moderation::FORCEBAN_USAGE,
        "tempban" => moderation::TEMPBAN_USAGE,
        "unban" => moderation::UNBAN_USAGE,
        "mute" => moderation::MUTE_USAGE,
        "tempmute" => moderation::TEMPMUTE_USAGE,
        "unmute" => moderation::UNMUTE_USAGE,
        "kick" => moderation::KICK_USAGE,
        "warn" => moderation::WARN_USAGE,
        "warnings" => moderation::WARNINGS_USAGE,
        "prune" => prune::PRUNE_USAGE,
        _ => return None,
    };
    Some(usage)
}

/// Usage lines relevant to `args`, or every line when none fit
#[must_use]
pub fn usage_hint(command: &str, args: &[&str], prefix: &str) -> Option<String> {
    let usage = usage_for(command)?;
    let mut lines = match_usage(usage, command, args);
    if lines.is_empty() {
        lines = usage.lines().collect();
    }
    Some(
        lines
            .iter()
            .map(|line| format_usage(line, prefix))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Usage message in the error style
#[must_use]
pub fn usage_message(hint: String) -> OutgoingMessage {
    OutgoingMessage::Embed(Embed::new().title("Usage").colour(ERROR_COLOUR).description(hint))
}

/// Build a request against `user` from the invoking context
pub(crate) fn request(
    ctx: Context<'_>,
    action: ModAction,
    user: &serenity::User,
    reason: Option<String>,
) -> Result<ModerationRequest, Error> {
    let guild_id = ctx.guild_id().ok_or(GUILD_ONLY)?;
    Ok(
        ModerationRequest::new(action, guild_id.get(), ctx.author().id.get(), user.id.get())
            .in_channel(ctx.channel_id().get())
            .with_reason(reason),
    )
}

/// Hand `request` to the moderation service and persist state on success.
///
/// Failures the service already reported to the channel end the command
/// normally; anything else propagates to the framework error hook.
pub(crate) async fn run_action(ctx: Context<'_>, request: ModerationRequest) -> Result<(), Error> {
    let data = ctx.data();
    match data.moderation.handle_action(&request).await {
        Ok(()) => {}
        Err(e) if e.is_user_facing() => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    data.save().await
}

/// Send `message` to the invoking channel
pub(crate) async fn reply(ctx: Context<'_>, message: OutgoingMessage) -> Result<(), Error> {
    ctx.data()
        .platform
        .send_message(ctx.channel_id().get(), message)
        .await?;
    Ok(())
}

/// Framework error hook: log, and answer argument errors with a usage hint.
///
/// Everything else goes to poise's default handling.
pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
    logging::log_command_error(&error);

    if let FrameworkError::ArgumentParse { ctx, .. } = &error {
        let command = ctx.command().name.as_str();
        let invocation = ctx.invocation_string();
        let args: Vec<&str> = invocation.split_whitespace().skip(1).collect();
        if let Some(hint) = usage_hint(command, &args, &ctx.data().config.prefix) {
            if let Err(e) = reply(*ctx, usage_message(hint)).await {
                warn!("Failed to send usage hint for {command}: {e}");
            }
            return;
        }
    }

    if let Err(e) = poise::builtins::on_error(error).await {
        warn!("Failed to handle framework error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_usage() {
        for command in all() {
            let usage = usage_for(&command.name).expect("command has usage");
            assert!(
                usage.contains(&format!("{{prefix}}{}", command.name)),
                "usage for {} does not name it",
                command.name
            );
        }
        assert!(usage_for("ping").is_none());
    }

    #[test]
    fn test_usage_hint_falls_back_to_all_lines() {
        let hint = usage_hint("prune", &["bogus"], "!").expect("prune has usage");
        assert_eq!(hint.lines().count(), prune::PRUNE_USAGE.lines().count());
        assert!(hint.contains("`!prune confirm`"));

        let hint = usage_hint("prune", &["confirm"], "?").expect("prune has usage");
        assert_eq!(hint, "`?prune confirm` - Confirms a pending prune");
    }

    #[test]
    fn test_commands_are_guild_only_prefix_commands() {
        for command in all() {
            assert!(command.guild_only, "{} should be guild only", command.name);
            assert!(command.prefix_action.is_some(), "{} should be a prefix command", command.name);
        }
    }
}
