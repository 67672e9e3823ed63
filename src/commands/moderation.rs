use super::{reply, request, run_action};
use crate::moderation::platform::{Embed, NOTICE_COLOUR, OutgoingMessage};
use crate::moderation::{ModAction, parse_duration};
use crate::{Context, Error};
use poise::command;
use poise::serenity_prelude as serenity;

pub const BAN_USAGE: &str = "`{prefix}ban <user> [reason]` - Bans a user from the server";
pub const FORCEBAN_USAGE: &str =
    "`{prefix}forceban <user> [reason]` - Bans a user by ID, even if they are not in the server";
pub const TEMPBAN_USAGE: &str =
    "`{prefix}tempban <user> <duration> [reason]` - Bans a user for a while, e.g. `1d12h`";
pub const UNBAN_USAGE: &str = "`{prefix}unban <user> [reason]` - Lifts a ban";
pub const MUTE_USAGE: &str = "`{prefix}mute <user> [reason]` - Gives a user the muted role";
pub const TEMPMUTE_USAGE: &str =
    "`{prefix}tempmute <user> <duration> [reason]` - Mutes a user for a while, e.g. `30m`";
pub const UNMUTE_USAGE: &str = "`{prefix}unmute <user>` - Removes the muted role";
pub const KICK_USAGE: &str = "`{prefix}kick <user> [reason]` - Kicks a user from the server";
pub const WARN_USAGE: &str = "`{prefix}warn <user> [reason]` - Adds a warning to a user";
pub const WARNINGS_USAGE: &str = "`{prefix}warnings <user>` - Lists a user's warnings";

/// Ban a member of the server
#[command(
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    category = "Moderation"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[rest]
    #[description = "Reason for the ban"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Ban, &user, reason)?).await
}

/// Ban a user who may have already left the server
#[command(
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    category = "Moderation"
)]
pub async fn forceban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[rest]
    #[description = "Reason for the ban"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::ForceBan, &user, reason)?).await
}

/// Ban a member for a limited time
#[command(
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    category = "Moderation"
)]
pub async fn tempban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "How long, e.g. 1d12h"] duration: String,
    #[rest]
    #[description = "Reason for the ban"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_timed(ctx, ModAction::TempBan, &user, &duration, reason).await
}

/// Lift a ban
#[command(
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    category = "Moderation"
)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User to unban"] user: serenity::User,
    #[rest]
    #[description = "Reason for the unban"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Unban, &user, reason)?).await
}

/// Give a member the muted role
#[command(
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    category = "Moderation"
)]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "User to mute"] user: serenity::User,
    #[rest]
    #[description = "Reason for the mute"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Mute, &user, reason)?).await
}

/// Mute a member for a limited time
#[command(
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    category = "Moderation"
)]
pub async fn tempmute(
    ctx: Context<'_>,
    #[description = "User to mute"] user: serenity::User,
    #[description = "How long, e.g. 30m"] duration: String,
    #[rest]
    #[description = "Reason for the mute"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_timed(ctx, ModAction::TempMute, &user, &duration, reason).await
}

/// Remove the muted role from a member
#[command(
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    category = "Moderation"
)]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "User to unmute"] user: serenity::User,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Unmute, &user, None)?).await
}

/// Kick a member from the server
#[command(
    prefix_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    category = "Moderation"
)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "User to kick"] user: serenity::User,
    #[rest]
    #[description = "Reason for the kick"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Kick, &user, reason)?).await
}

/// Add a warning to a member
#[command(
    prefix_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    category = "Moderation"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: serenity::User,
    #[rest]
    #[description = "Reason for the warning"]
    reason: Option<String>,
) -> Result<(), Error> {
    run_action(ctx, request(ctx, ModAction::Warn, &user, reason)?).await
}

/// List a member's warnings
#[command(
    prefix_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    category = "Moderation"
)]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "User to look up"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(super::GUILD_ONLY)?;
    let ledger = ctx.data().guilds.warnings(guild_id.get(), user.id.get());
    reply(ctx, warnings_message(user.id.get(), &ledger, ctx.author().id.get())).await
}

async fn run_timed(
    ctx: Context<'_>,
    action: ModAction,
    user: &serenity::User,
    duration: &str,
    reason: Option<String>,
) -> Result<(), Error> {
    let duration = match parse_duration(duration) {
        Ok(duration) => duration,
        Err(e) => return reply(ctx, OutgoingMessage::error(e.to_string())).await,
    };
    run_action(ctx, request(ctx, action, user, reason)?.for_duration(duration)).await
}

fn warnings_message(target_id: u64, ledger: &[String], requester_id: u64) -> OutgoingMessage {
    if ledger.is_empty() {
        return OutgoingMessage::success(format!("<@{target_id}> has no warnings!"), requester_id);
    }
    let lines: Vec<String> = ledger
        .iter()
        .enumerate()
        .map(|(i, reason)| format!("{}. {reason}", i + 1))
        .collect();
    OutgoingMessage::Embed(
        Embed::new()
            .title(format!("Warnings ({})", ledger.len()))
            .colour(NOTICE_COLOUR)
            .description(format!("<@{target_id}>\n{}", lines.join("\n")))
            .footer(format!("Requested by {requester_id}")),
    )
}
