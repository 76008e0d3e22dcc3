mod telegram;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use mediabot::{
    janitor, ArtifactStore, BotConfig, ChatTransport, FfmpegTranscoder, JobOrchestrator,
    RequestCorrelator, RouteOutcome, Router, UrlClassifier, YtDlp,
};
use teloxide::prelude::*;
use crate::telegram::TelegramTransport;

/// Telegram bot that downloads, trims and re-encodes linked videos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Bot API token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: String,
}

fn describe(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Launched(handles) => format!("launched {} job(s)", handles.len()),
        RouteOutcome::Prompted { token, .. } => format!("prompted (request {})", token),
        other => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with -v
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();

    let cfg = BotConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    info!("Media bot starting");
    info!("Configuration loaded:");
    info!("  Download dir: {}", cfg.download_dir.display());
    info!("  Upload limit: {} bytes", cfg.max_upload_bytes);
    info!("  Cleanup every {}s, file TTL {}s", cfg.cleanup_interval_secs, cfg.file_ttl_secs);
    info!("  Pending request TTL: {}s", cfg.pending_ttl_secs);
    info!("  Probe timeout: {}s", cfg.probe_timeout_secs);
    info!("  Download timeout: {:?}", cfg.download_timeout_secs);
    info!("  Transcode timeout: {:?}", cfg.transcode_timeout_secs);
    info!("  Max concurrent jobs: {:?}", cfg.max_concurrent_jobs);
    let ytdlp = YtDlp::from_config(&cfg);
    match ytdlp.cookies() {
        Some(path) => info!("  Cookies: {}", path.display()),
        None => info!("  Cookies: none ({} not found)", cfg.cookies_file.display()),
    }

    let store = ArtifactStore::from_config(&cfg);
    store.ensure_dir()?;

    let transport = Arc::new(TelegramTransport::connect(&args.token).await?);
    let chat: Arc<dyn ChatTransport> = transport.clone();

    let correlator = Arc::new(RequestCorrelator::new(cfg.pending_ttl()));
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(ytdlp),
        Arc::new(FfmpegTranscoder::from_config(&cfg)),
        chat.clone(),
        store.clone(),
        &cfg,
    ));
    let router = Arc::new(Router::new(
        UrlClassifier::from_config(&cfg),
        correlator.clone(),
        orchestrator,
        chat,
    ));

    janitor::spawn_janitor(store, correlator, cfg.cleanup_interval());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let router = Arc::clone(&router);
            let transport = Arc::clone(&transport);
            move |msg: Message| {
                let router = Arc::clone(&router);
                let transport = Arc::clone(&transport);
                async move {
                    if let Some(inbound) = transport.inbound(&msg) {
                        match router.on_message(&inbound).await {
                            Ok(outcome) => debug!("Message {} in chat {}: {}", msg.id.0, msg.chat.id, describe(&outcome)),
                            Err(e) => warn!("Failed to handle message {} in chat {}: {:#}", msg.id.0, msg.chat.id, e),
                        }
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let router = Arc::clone(&router);
            let transport = Arc::clone(&transport);
            move |query: CallbackQuery| {
                let router = Arc::clone(&router);
                let transport = Arc::clone(&transport);
                async move {
                    if let Err(e) = transport.bot().answer_callback_query(query.id.clone()).await {
                        debug!("Failed to answer callback: {}", e);
                    }
                    let (Some(prompt), Some(data)) = (transport.callback_message(&query), query.data.as_deref()) else {
                        return respond(());
                    };
                    match router.on_callback(&prompt, data).await {
                        Ok(outcome) => debug!("Callback {:?}: {}", data, describe(&outcome)),
                        Err(e) => warn!("Failed to handle callback {:?}: {:#}", data, e),
                    }
                    respond(())
                }
            }
        }));

    info!("🚀 Listening for updates");
    Dispatcher::builder(transport.bot().clone(), handler)
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped, in-flight jobs are abandoned");
    Ok(())
}
