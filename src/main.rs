mod category;
mod commands;
mod config;
mod entry_point;
mod form;
mod interactions;
mod logging;
mod platform;
mod provision;
mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tokio::sync::RwLock;

use poise::serenity_prelude::{self as serenity, GatewayIntents};

use commands::reload;
use config::Config;
use entry_point::RetryRegistry;
use platform::HttpPlatform;
use provision::NameReservations;

const COMMAND_FAILED: &str = "오류가 발생했습니다.";

// --- Poise Types ---

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub config: Arc<RwLock<Config>>,
    pub retries: RetryRegistry,
    pub reservations: NameReservations,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

// --- Error Handler ---

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::UnknownCommand { .. } | poise::FrameworkError::NotAnOwner { .. } => {}
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!(
                "Ignoring exception in command `{}`: {:?}",
                ctx.command().qualified_name,
                error
            );
            if let Err(e) = ctx.reply(COMMAND_FAILED).await {
                log::error!("Failed to send error message: {:?}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            log::error!(
                "Error while handling event `{}`: {:?}",
                event.snake_case_name(),
                error
            );
        }
        // Argument parse failures, failed checks, panics and the like
        error => {
            if let Some(ctx) = error.ctx() {
                log::error!(
                    "Error in command `{}`: {}",
                    ctx.command().qualified_name,
                    error
                );
                if let Err(e) = ctx.reply(COMMAND_FAILED).await {
                    log::error!("Failed to send error message: {:?}", e);
                }
            } else if let Err(e) = poise::builtins::on_error(error).await {
                log::error!("Error while handling error: {:?}", e);
            }
        }
    }
}

// --- Main ---

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    // Load configuration
    let config = match Config::load().await {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return;
        }
    };

    let token = config.discord_token.clone();
    let prefix = config.command_prefix.clone();
    let config_arc = Arc::new(RwLock::new(config));
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![reload::reload()],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::InteractionCreate { interaction } = event {
                        interactions::handle_interaction(ctx, data, interaction).await?;
                    }
                    Ok(())
                })
            },
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                log::info!("Logged in as {}", ready.user.name);

                log::info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let entry_channel = config_arc.read().await.entry_channel_id;
                entry_point::reconcile(&HttpPlatform::new(&ctx.http), entry_channel, ready.user.id)
                    .await?;

                Ok(Data {
                    config: config_arc,
                    retries: RetryRegistry::default(),
                    reservations: NameReservations::default(),
                })
            })
        })
        .build();

    // Prefix commands need message content; interactions need no intents at all
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await;

    let mut client = match client {
        Ok(client) => client,
        Err(why) => {
            log::error!("Failed to build client: {:?}", why);
            return;
        }
    };

    if let Err(why) = client.start().await {
        log::error!("Client error: {:?}", why);
    }
}
