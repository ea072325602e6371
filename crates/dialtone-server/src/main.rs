//! Dialtone server binary, the entry point for the IVR service.
//!
//! Starts an axum HTTP server with structured logging, the media pipeline,
//! background maintenance tasks, and graceful shutdown on SIGTERM/SIGINT.

use dialtone_media::{CommandSource, FfmpegTrimmer, JobRunner, MediaStore, Reslicer};
use dialtone_server::{
    app,
    assistant::OpenAiChat,
    background, config,
    diagnostics::LogBuffer,
    flow::{CallFlow, FlowSettings},
    retention,
    session::SessionStore,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("DIALTONE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Console output per `logging`, plus a plain copy of every line into the
/// diagnostics buffer.
fn init_tracing(logging: &config::LoggingConfig, logs: &LogBuffer) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(logging.json.then(|| fmt::layer().json()))
        .with((!logging.json).then(fmt::layer))
        .with(fmt::layer().with_ansi(false).with_writer(logs.clone()))
        .init();
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; the server cannot start without valid config");

    let logs = LogBuffer::new(config.diagnostics.capacity);
    init_tracing(&config.logging, &logs);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );
    tracing::debug!(?config, "effective configuration");

    // Media pipeline
    let media = MediaStore::new(&config.media);
    media
        .ensure_dir()
        .await
        .expect("failed to create media storage directory; check media.storage_dir in config");

    let source = Arc::new(CommandSource::new(
        config.media.fetch_binary.clone(),
        config.media.max_duration_seconds,
        config.media.fetch_timeout(),
    ));
    let trimmer = Arc::new(FfmpegTrimmer::new(
        config.media.ffmpeg_binary.clone(),
        config.media.trim_timeout(),
    ));
    let jobs = JobRunner::new(source, media.clone());
    let reslicer = Reslicer::new(media.clone(), trimmer);

    // Call flow
    let settings = FlowSettings::from_config(&config.telephony);
    if settings.allowed_callers.is_empty() {
        tracing::warn!("telephony.allowed_callers is empty; every incoming call will be rejected");
    }
    if config.assistant.api_keys.is_empty() {
        tracing::warn!("no assistant credentials configured; chat replies will be apologies");
    }
    let assistant = Arc::new(OpenAiChat::new(&config.assistant));
    let flow = Arc::new(CallFlow::new(
        SessionStore::new(),
        jobs,
        assistant,
        reslicer,
        settings,
    ));

    // Background tasks
    tokio::spawn(background::start_pruning_task(
        flow.clone(),
        config.telephony.session_idle(),
    ));
    let sweep_interval = Duration::from_secs((config.media.retention_seconds / 2).clamp(30, 600));
    tokio::spawn(retention::start_retention_task(media.clone(), sweep_interval));

    // Build application
    let state = AppState {
        flow,
        media,
        logs,
        diagnostics: config.diagnostics.clone(),
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, public_url = %config.media.public_base_url, "starting dialtone server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("dialtone server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
