//! Dialtone server library logic.

pub mod api;
pub mod api_diagnostics;
pub mod api_media;
pub mod api_voice;
pub mod assistant;
pub mod background;
pub mod config;
pub mod diagnostics;
pub mod flow;
pub mod middleware;
pub mod playback;
pub mod retention;
pub mod session;
pub mod t9;
pub mod twiml;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use config::DiagnosticsConfig;
use diagnostics::LogBuffer;
use dialtone_media::MediaStore;
use flow::CallFlow;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Call state machine with its session and job stores.
    pub flow: Arc<CallFlow>,
    /// Storage the media endpoint serves from.
    pub media: MediaStore,
    /// Recent log lines for the diagnostics view.
    pub logs: LogBuffer,
    /// Diagnostics access settings.
    pub diagnostics: DiagnosticsConfig,
}

/// Webhook bodies are small forms.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let settings = state.flow.settings().clone();
    let voice_routes = api_voice::routes().layer(CatchPanicLayer::custom(
        move |panic: Box<dyn Any + Send + 'static>| -> Response {
            let detail = panic
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| panic.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            tracing::error!(panic = detail, "webhook handler panicked");
            (
                [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
                flow::apology(&settings.voice, &settings.language).render(),
            )
                .into_response()
        },
    ));

    let diagnostics_routes = Router::new()
        .route("/diagnostics/logs", get(api_diagnostics::get_logs_handler))
        .layer(axum::middleware::from_fn(middleware::diagnostics_gate));

    Router::new()
        .route("/health", get(api::health))
        .route("/media/{filename}", get(api_media::get_media_handler))
        .merge(voice_routes)
        .merge(diagnostics_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
