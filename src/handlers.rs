use crate::{Data, EVENT_TARGET};
use poise::serenity_prelude::{self as serenity, Context, EventHandler, GuildId, Ready};
use tracing::{info, warn};

/// Gateway events outside the command framework
pub struct Handler {
    pub data: Data,
}

impl Handler {
    #[must_use]
    pub fn new(data: Data) -> Self {
        Self { data }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            target: EVENT_TARGET,
            shard_id = ctx.shard_id.0,
            "Connected as {}",
            ready.user.name
        );
        // Catch up on reversals that came due while offline
        self.data.request_check().await;
    }

    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let cached = ctx.cache.guild_count();
        if cached != guilds.len() {
            warn!(
                target: EVENT_TARGET,
                "Cache guild count mismatch: {cached} (cache) vs {} (actual)",
                guilds.len()
            );
        }
        info!(
            target: EVENT_TARGET,
            pending_reversals = self.data.future_actions.len(),
            "Cache ready, moderating {} guild(s)",
            guilds.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }
}
