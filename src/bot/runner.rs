//! Bot runner: wires the intake handler into the teloxide dispatcher

use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

use crate::classifier::OnnxClassifier;
use crate::config::BotConfig;
use crate::diagnosis_log::DiagnosisLog;
use crate::severity::{GeminiSeverityClient, SeverityLookup};

use super::message_handler::{photo_handler, IntakeHandler};

/// Update routing: photo messages go to the intake handler, everything else is ignored
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .filter(|msg: Message| msg.photo().is_some())
        .endpoint(photo_handler)
}

/// Load the model and collaborators described by `config`
pub async fn build_intake_handler(config: &BotConfig) -> Result<IntakeHandler> {
    std::fs::create_dir_all(&config.temp_dir)?;

    let model_config = config.model.clone();
    let classifier = tokio::task::spawn_blocking(move || OnnxClassifier::load(&model_config)).await??;
    let severity: Arc<dyn SeverityLookup> = Arc::from(GeminiSeverityClient::from_config(&config.severity)?);

    let handler = IntakeHandler::new(
        Arc::new(classifier),
        severity,
        config.temp_dir.clone(),
        config.classifier_timeout,
    );

    Ok(match &config.diagnosis_log_path {
        Some(path) => {
            info!(path = %path.display(), "Recording diagnoses");
            handler.with_diagnosis_log(DiagnosisLog::new(path.clone()))
        }
        None => handler,
    })
}

/// Start the bot and poll for updates until Ctrl-C
pub async fn run_bot(config: BotConfig) -> Result<()> {
    info!("Starting Skin Diagnosis Telegram Bot");

    let handler = Arc::new(build_intake_handler(&config).await?);
    let bot = Bot::new(config.bot_token);

    info!("🤖 Skin Diagnosis Bot is live, starting dispatcher");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![handler])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Blocking entry point that also works when a tokio runtime is already running.
///
/// A multi-threaded runtime is reused through `block_in_place`; a
/// current-thread runtime cannot block, so the bot then gets its own runtime
/// on a dedicated thread.
pub fn start(config: BotConfig) -> Result<()> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            info!("Reusing the running tokio runtime");
            tokio::task::block_in_place(|| handle.block_on(run_bot(config)))
        }
        Ok(_) => {
            info!("Current-thread runtime detected, running bot on a dedicated thread");
            std::thread::spawn(move || new_runtime()?.block_on(run_bot(config)))
                .join()
                .map_err(|_| anyhow!("Bot thread panicked"))?
        }
        Err(_) => new_runtime()?.block_on(run_bot(config)),
    }
}

fn new_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}
