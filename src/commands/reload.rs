use poise::CreateReply;

use crate::{Context, Error, config::Config, entry_point, platform::HttpPlatform};

/// Reload `config.json` and re-check the entry message.
#[poise::command(
    prefix_command,
    slash_command,
    owners_only,
    hide_in_help,
    description_localized("en-US", "Reloads the configuration and re-posts the entry message if needed.")
)]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let config = Config::load().await?;
    let entry_channel = config.entry_channel_id;
    *ctx.data().config.write().await = config;

    entry_point::reconcile(
        &HttpPlatform::new(ctx.http()),
        entry_channel,
        ctx.framework().bot_id,
    )
    .await?;
    log::info!("리로드 완료");

    ctx.send(CreateReply::default().content("리로드 완료").ephemeral(true))
        .await?;
    Ok(())
}
