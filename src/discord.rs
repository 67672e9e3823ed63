//! Serenity implementation of the platform capabilities

use crate::moderation::platform::{
    Embed, GuildHierarchy, MemberInfo, OutgoingMessage, Platform, PlatformError, PlatformResult,
};
use poise::serenity_prelude::{
    self as serenity, ChannelId, Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId,
    Http, Member, PartialGuild, RoleId, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

const BAN_MEMBERS: &str = "Ban Members";
const KICK_MEMBERS: &str = "Kick Members";
const MANAGE_ROLES: &str = "Manage Roles";
const SEND_MESSAGES: &str = "Send Messages";

/// Platform backed by the Discord HTTP API
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn guild(&self, guild_id: GuildId) -> PlatformResult<PartialGuild> {
        guild_id
            .to_partial_guild(self.http.as_ref())
            .await
            .map_err(|e| not_found(&e, format!("guild {guild_id}")))
    }

    /// The member, or `None` when the user is not in the guild
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<Option<Member>> {
        match guild_id.member(self.http.as_ref(), user_id).await {
            Ok(member) => Ok(Some(member)),
            Err(e) if matches!(status_of(&e), Some(404)) => Ok(None),
            Err(e) => Err(classify(&e, "View Members")),
        }
    }

    async fn bot_id(&self) -> PlatformResult<UserId> {
        self.http
            .get_current_user()
            .await
            .map(|user| user.id)
            .map_err(|e| classify(&e, "Identify"))
    }
}

#[async_trait::async_trait]
impl Platform for SerenityPlatform {
    async fn hierarchy(
        &self,
        guild_id: u64,
        requester_id: u64,
        target_id: u64,
    ) -> PlatformResult<GuildHierarchy> {
        let guild_id = guild_id_of(guild_id)?;
        let guild = self.guild(guild_id).await?;
        let bot_id = self.bot_id().await?;

        let requester = self.member(guild_id, user_id_of(requester_id)?).await?;
        let target = self.member(guild_id, user_id_of(target_id)?).await?;
        let bot = self
            .member(guild_id, bot_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("bot member in guild {guild_id}")))?;

        Ok(GuildHierarchy {
            owner_id: guild.owner_id.get(),
            requester: requester.map(|member| member_info(&guild, &member)),
            target: target.map(|member| member_info(&guild, &member)),
            bot: member_info(&guild, &bot),
        })
    }

    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_days: u8,
        reason: Option<String>,
    ) -> PlatformResult<()> {
        let guild_id = guild_id_of(guild_id)?;
        let user_id = user_id_of(user_id)?;
        let result = match reason.as_deref() {
            Some(reason) => {
                guild_id
                    .ban_with_reason(self.http.as_ref(), user_id, delete_message_days, reason)
                    .await
            }
            None => guild_id.ban(self.http.as_ref(), user_id, delete_message_days).await,
        };
        result.map_err(|e| classify(&e, BAN_MEMBERS))?;
        info!("Banned user {user_id} in guild {guild_id}");
        Ok(())
    }

    async fn unban(&self, guild_id: u64, user_id: u64) -> PlatformResult<()> {
        let guild_id = guild_id_of(guild_id)?;
        let user_id = user_id_of(user_id)?;
        guild_id
            .unban(self.http.as_ref(), user_id)
            .await
            .map_err(|e| classify(&e, BAN_MEMBERS))?;
        info!("Unbanned user {user_id} in guild {guild_id}");
        Ok(())
    }

    async fn kick(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<String>,
    ) -> PlatformResult<()> {
        let guild_id = guild_id_of(guild_id)?;
        let user_id = user_id_of(user_id)?;
        let result = match reason.as_deref() {
            Some(reason) => {
                guild_id
                    .kick_with_reason(self.http.as_ref(), user_id, reason)
                    .await
            }
            None => guild_id.kick(self.http.as_ref(), user_id).await,
        };
        result.map_err(|e| classify(&e, KICK_MEMBERS))?;
        info!("Kicked user {user_id} from guild {guild_id}");
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: Option<String>,
    ) -> PlatformResult<()> {
        let guild_id = guild_id_of(guild_id)?;
        let user_id = user_id_of(user_id)?;
        let role_id = role_id_of(role_id)?;
        self.check_role_below_bot(guild_id, role_id).await?;
        self.http
            .add_member_role(guild_id, user_id, role_id, reason.as_deref())
            .await
            .map_err(|e| classify(&e, MANAGE_ROLES))
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: Option<String>,
    ) -> PlatformResult<()> {
        let guild_id = guild_id_of(guild_id)?;
        let user_id = user_id_of(user_id)?;
        let role_id = role_id_of(role_id)?;
        self.check_role_below_bot(guild_id, role_id).await?;
        self.http
            .remove_member_role(guild_id, user_id, role_id, reason.as_deref())
            .await
            .map_err(|e| classify(&e, MANAGE_ROLES))
    }

    async fn send_message(&self, channel_id: u64, message: OutgoingMessage) -> PlatformResult<()> {
        let channel_id = channel_id_of(channel_id)?;
        let builder = match message {
            OutgoingMessage::Text(text) => CreateMessage::new().content(text),
            OutgoingMessage::Embed(embed) => CreateMessage::new().embed(create_embed(embed)),
        };
        channel_id
            .send_message(self.http.as_ref(), builder)
            .await
            .map_err(|e| classify(&e, SEND_MESSAGES))?;
        Ok(())
    }

    async fn channel_guild(&self, channel_id: u64) -> PlatformResult<Option<u64>> {
        let channel_id = channel_id_of(channel_id)?;
        match channel_id.to_channel(self.http.as_ref()).await {
            Ok(channel) => Ok(channel.guild().map(|channel| channel.guild_id.get())),
            Err(e) if matches!(status_of(&e), Some(404)) => Ok(None),
            Err(e) => Err(classify(&e, "View Channel")),
        }
    }

    async fn prunable_count(&self, guild_id: u64, days: u8) -> PlatformResult<u64> {
        let guild_id = guild_id_of(guild_id)?;
        guild_id
            .prune_count(self.http.as_ref(), days)
            .await
            .map(|prune| prune.pruned)
            .map_err(|e| classify(&e, KICK_MEMBERS))
    }

    async fn prune(&self, guild_id: u64, days: u8, reason: Option<String>) -> PlatformResult<u64> {
        let guild_id = guild_id_of(guild_id)?;
        let pruned = guild_id
            .start_prune(self.http.as_ref(), days)
            .await
            .map(|prune| prune.pruned)
            .map_err(|e| classify(&e, KICK_MEMBERS))?;
        info!(
            "Pruned {pruned} member(s) inactive for {days} day(s) from guild {guild_id}: {}",
            reason.as_deref().unwrap_or_default()
        );
        Ok(pruned)
    }
}

impl SerenityPlatform {
    /// Roles at or above the bot's highest role cannot be assigned by it
    async fn check_role_below_bot(&self, guild_id: GuildId, role_id: RoleId) -> PlatformResult<()> {
        let guild = self.guild(guild_id).await?;
        let bot_id = self.bot_id().await?;
        if guild.owner_id == bot_id {
            return Ok(());
        }

        let role = guild
            .roles
            .get(&role_id)
            .ok_or_else(|| PlatformError::NotFound(format!("role {role_id}")))?;
        let bot = self
            .member(guild_id, bot_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("bot member in guild {guild_id}")))?;

        match member_info(&guild, &bot).top_role {
            Some(top) if top > i64::from(role.position) => Ok(()),
            _ => {
                debug!(%guild_id, %role_id, "Role is not below the bot's highest role");
                Err(PlatformError::Hierarchy)
            }
        }
    }
}

fn member_info(guild: &PartialGuild, member: &Member) -> MemberInfo {
    let top_role = member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| i64::from(role.position))
        .max();
    MemberInfo::new(member.user.id.get(), top_role)
        .with_roles(member.roles.iter().map(|role_id| role_id.get()).collect())
}

fn create_embed(embed: Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(title) = embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = embed.description {
        builder = builder.description(description);
    }
    if let Some(colour) = embed.colour {
        builder = builder.colour(Colour::new(colour));
    }
    for field in embed.fields {
        builder = builder.field(field.name, field.value, field.inline);
    }
    if let Some(footer) = embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer));
    }
    builder
}

/// HTTP status of a failed request, if it got that far
fn status_of(error: &serenity::Error) -> Option<u16> {
    match error {
        serenity::Error::Http(e) => e.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

fn classify(error: &serenity::Error, permission: &str) -> PlatformError {
    match status_of(error) {
        Some(403) => PlatformError::MissingPermission(permission.to_string()),
        Some(404) => PlatformError::NotFound(error.to_string()),
        _ => PlatformError::Request(error.to_string()),
    }
}

fn not_found(error: &serenity::Error, what: String) -> PlatformError {
    match status_of(error) {
        Some(404) => PlatformError::NotFound(what),
        _ => classify(error, "View Guild"),
    }
}

fn nonzero(id: u64, what: &str) -> PlatformResult<u64> {
    if id == 0 {
        Err(PlatformError::NotFound(format!("{what} 0")))
    } else {
        Ok(id)
    }
}

fn guild_id_of(id: u64) -> PlatformResult<GuildId> {
    nonzero(id, "guild").map(GuildId::new)
}

fn user_id_of(id: u64) -> PlatformResult<UserId> {
    nonzero(id, "user").map(UserId::new)
}

fn role_id_of(id: u64) -> PlatformResult<RoleId> {
    nonzero(id, "role").map(RoleId::new)
}

fn channel_id_of(id: u64) -> PlatformResult<ChannelId> {
    nonzero(id, "channel").map(ChannelId::new)
}
