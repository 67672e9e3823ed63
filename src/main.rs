use std::sync::Arc;

use gavel::config::BotConfig;
use gavel::discord::SerenityPlatform;
use gavel::handlers::Handler;
use gavel::{Data, Error, commands, logging};
use poise::serenity_prelude::{self as serenity, GatewayIntents, Http};
use tracing::{error, info};

async fn async_main() -> Result<(), Error> {
    let config = BotConfig::load_default().await?;
    logging::init(&config.log_dir)?;
    let token = BotConfig::token()?;

    let http = Arc::new(Http::new(&token));
    let platform = SerenityPlatform::new(Arc::clone(&http));
    let prefix = config.prefix.clone();
    let data = Data::load(config, Arc::new(platform)).await?;
    let future_actions = data.start_future_actions();

    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            pre_command: |ctx| Box::pin(logging::log_command_start(ctx)),
            post_command: |ctx| Box::pin(logging::log_command_end(ctx)),
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                logging::log_console(&format!("{} is ready", ready.user.name));
                Ok(framework_data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(Handler::new(data.clone()))
        .framework(framework)
        .await?;

    info!("Starting bot...");
    tokio::select! {
        result = client.start() => {
            if let Err(err) = result {
                error!("Client stopped: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    data.shutdown().await;
    if let Err(err) = future_actions.await {
        error!("Future action task failed: {err}");
    }
    data.save().await?;
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error building runtime: {err}");
            return;
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        eprintln!("Error: {err}");
    }
}
