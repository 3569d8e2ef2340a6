// --- File: crates/services/clinicbot_bot/src/main.rs ---
use clinicbot_bot::app::{build_dispatcher, build_gateway, open_repository, spawn_conversation_pruner};
use clinicbot_bot::telegram::{register_commands, run_polling, TelegramTransport};
use clinicbot_common::error::{config_error, ClinicError};
use clinicbot_common::logging;
use clinicbot_config::load_config;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tracing::{error, info};

const PRUNE_EVERY: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), ClinicError> {
    let config = Arc::new(load_config().map_err(config_error)?);
    let _log_guard = logging::init_from_config(&config.logging);

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return Err(config_error(e));
    }

    let repository = open_repository(&config).await?;
    let gateway = build_gateway(&config).await?;

    let bot = Bot::new(&config.telegram.bot_token);
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let dispatcher = Arc::new(build_dispatcher(&config, gateway, repository, transport)?);

    register_commands(&bot).await;
    spawn_conversation_pruner(dispatcher.clone(), PRUNE_EVERY);

    info!(admin = config.telegram.admin_id.is_some(), "clinic bot started");
    run_polling(bot, dispatcher).await;
    info!("clinic bot stopped");
    Ok(())
}
