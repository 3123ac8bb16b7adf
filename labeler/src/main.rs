mod app_config;
mod email;
mod error;
mod model;
mod prompt;
mod state;
#[cfg(test)]
mod testing;
mod util;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use app_config::AppConfig;
use clap::Parser;
use email::{Classifier, GmailClient};
use mimalloc::MiMalloc;
use prompt::AiClassifier;
use state::{tasks, Orchestrator};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

/// Label Gmail messages with a language model and keyword rules.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Log what would change without touching the mailbox
    #[arg(long)]
    dry_run: bool,

    /// Gmail search query for the new-mail pass
    #[arg(long)]
    q: Option<String>,

    /// Maximum messages per pass
    #[arg(long)]
    max_results: Option<u32>,

    /// Keep running, one label run per interval
    #[arg(long = "loop")]
    run_loop: bool,

    /// Seconds between runs in loop mode
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// TOML file with settings, environment variables still win
    #[arg(long, env = "LABELER_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    // RUST_LOG, then LOG_LEVEL, then info
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            std::env::var("LOG_LEVEL")
                .ok()
                .filter(|level| !level.trim().is_empty())
                .and_then(|level| EnvFilter::try_new(level).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.dry_run, args.q, args.max_results);

    let provider = config.provider()?;
    tracing::info!(
        "Provider {} with model {} | dry_run={}",
        provider.name(),
        provider.model(),
        config.dry_run
    );

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(config.request_timeout())
        .build()?;

    let access_token = config
        .gmail_access_token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .context("GMAIL_ACCESS_TOKEN is not set")?;
    let mailbox = GmailClient::new(http_client.clone(), access_token, config.set_label_colors);

    let vocabulary = Arc::new(config.vocabulary()?);
    let ai = AiClassifier::new(
        http_client,
        provider,
        Arc::clone(&vocabulary),
        config.retry_policy(),
        config.temperature,
    );
    let orchestrator = Orchestrator::new(
        mailbox,
        Classifier::new(ai, vocabulary),
        config.run_options(),
    );

    if !args.run_loop {
        orchestrator.run_once().await?;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let orchestrator = &orchestrator;
    tasks::run_forever(
        tasks::effective_interval(args.interval),
        cancel,
        move || async move { orchestrator.run_once().await.map(|_| ()) },
    )
    .await;

    Ok(())
}

/// Cancels `cancel` on Ctrl+C or SIGTERM. The current run finishes first.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown requested, stopping after the current run");
    cancel.cancel();
}
