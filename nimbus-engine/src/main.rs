use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nimbus_channels::{ChannelDriver, EmailDriver, HttpMailer, InAppDriver, SlackChannelDriver, SlackDmDriver};
use nimbus_clients::{ExternalHttpClient, HttpMeetingPlatformClient, HttpObjectStoreClient, RetryPolicy};
use nimbus_core::ConfigStore;
use nimbus_observability::{init_process_logging, ProcessKind};
use nimbus_runtime::{MediaUploadWorker, NotificationWorker, TranscriptWorker};
use nimbus_server::{serve, AppState};
use nimbus_types::NotificationChannel;
use tracing::info;

const TENANT_PERMITS: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "nimbus-engine")]
#[command(about = "Headless Nimbus orchestration-plane backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the webhook ingest HTTP API alongside the cron-driven workers.
    Serve {
        #[arg(long, alias = "host", default_value = "127.0.0.1")]
        hostname: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
        #[arg(long)]
        state_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { hostname, port, state_dir } => {
            let state_dir = resolve_state_dir(state_dir);
            let logs_dir = nimbus_observability::canonical_logs_dir_from_root(&state_dir);
            let (_guard, log_info) = init_process_logging(ProcessKind::Engine, &logs_dir, 14)?;

            let state = build_state(&state_dir).await?;
            let addr: SocketAddr =
                format!("{hostname}:{port}").parse().context("invalid hostname or port")?;
            log_startup_paths(&state_dir, &addr, &log_info.logs_dir);

            spawn_workers(&state).await;
            serve(addr, state).await?;
        }
    }

    Ok(())
}

fn resolve_state_dir(flag: Option<String>) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("NIMBUS_STATE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(".nimbus")
}

fn log_startup_paths(state_dir: &PathBuf, addr: &SocketAddr, logs_dir: &str) {
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("<unknown>"));
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("<unknown>"));
    info!("starting nimbus-engine on http://{addr}");
    info!(
        "startup paths: exe={} cwd={} state_dir={} logs_dir={}",
        exe.display(),
        cwd.display(),
        state_dir.display(),
        logs_dir,
    );
}

async fn build_state(state_dir: &Path) -> anyhow::Result<AppState> {
    let config = ConfigStore::new(state_dir.join("config.json"), None).await?;
    let app_config = config.get().await;

    let http = reqwest::Client::new();
    let retry_policy = RetryPolicy::default();
    let external = ExternalHttpClient::new(http, retry_policy, TENANT_PERMITS);

    let meeting_platform = Arc::new(HttpMeetingPlatformClient::new(
        external.clone(),
        app_config.meeting_platform_base_url.clone().unwrap_or_default(),
        app_config.meeting_platform_api_key.clone().unwrap_or_default(),
    ));
    let object_store = Arc::new(HttpObjectStoreClient::new(
        external,
        app_config.object_store_bucket.clone().unwrap_or_default(),
        app_config.object_store_region.clone().unwrap_or_default(),
    ));

    Ok(AppState::new(config, meeting_platform, object_store).await)
}

/// Builds the channel drivers the notification worker dispatches to (spec
/// §4.6). A driver is only wired when its credentials are configured; an
/// unconfigured channel's notifications fail loudly through the worker's
/// own `failed` bookkeeping rather than silently dropping.
fn build_channel_drivers(config: &nimbus_core::AppConfig) -> HashMap<NotificationChannel, Arc<dyn ChannelDriver>> {
    let mut drivers: HashMap<NotificationChannel, Arc<dyn ChannelDriver>> = HashMap::new();
    drivers.insert(NotificationChannel::InApp, Arc::new(InAppDriver::new()));

    if let Some(bot_token) = config.slack_bot_token.clone() {
        drivers.insert(NotificationChannel::SlackDm, Arc::new(SlackDmDriver::new(bot_token.clone())));
        drivers.insert(NotificationChannel::SlackChannel, Arc::new(SlackChannelDriver::new(bot_token)));
    }

    if let (Some(base_url), Some(api_key)) = (config.mailer_base_url.clone(), config.mailer_api_key.clone()) {
        let mailer = HttpMailer::new(base_url, api_key);
        drivers.insert(NotificationChannel::Email, Arc::new(EmailDriver::new(mailer)));
    }

    drivers
}

/// Spawns the three cron-driven workers (spec §4.4, §4.6) as free-running
/// tick loops, the way `nimbus-server::serve` leaves tick scheduling to its
/// caller rather than owning it itself.
async fn spawn_workers(state: &AppState) {
    let notification_worker = NotificationWorker::new(
        state.notification_queue.clone(),
        state.user_metrics.clone(),
        build_channel_drivers(&state.config.get().await),
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(15));
        loop {
            interval.tick().await;
            let report = notification_worker.tick(chrono::Utc::now()).await;
            tracing::debug!(?report, "notification_worker tick");
        }
    });

    let media_worker = MediaUploadWorker::new(
        state.recordings.clone(),
        state.bot_deployments.clone(),
        state.meeting_platform.clone(),
        state.object_store.clone(),
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(30));
        loop {
            interval.tick().await;
            let report = media_worker.tick(chrono::Utc::now()).await;
            tracing::debug!(?report, "media_upload_worker tick");
        }
    });

    let transcript_worker = TranscriptWorker::new(
        state.recordings.clone(),
        state.bot_deployments.clone(),
        state.retry_jobs.clone(),
        state.meeting_platform.clone(),
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(StdDuration::from_secs(30));
        loop {
            interval.tick().await;
            let report = transcript_worker.tick(chrono::Utc::now()).await;
            tracing::debug!(?report, "transcript_worker tick");
        }
    });
}
