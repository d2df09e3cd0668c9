use std::env;

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use shift_warden::config::BotConfig;
use shift_warden::{Data, Error, commands, handlers, logging};
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    let config = BotConfig::load().await?;
    logging::init(&config.log_dir)?;

    let token = env::var("DISCORD_TOKEN").map_err(|_| Error::from("DISCORD_TOKEN must be set"))?;

    let data = Data::open(config).await?;
    info!(config = ?data.config, "Record store opened");

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console("Registering commands globally");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    // Role names are resolved from the member's roles, which needs the members intent.
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to build runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        error!("Fatal error: {err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
