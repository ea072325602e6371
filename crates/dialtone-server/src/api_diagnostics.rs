//! Plain-text view of recent log lines. Access is checked by
//! [`crate::middleware::diagnostics_gate`].

use crate::AppState;
use axum::{
    extract::Extension,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const REFRESH: HeaderName = HeaderName::from_static("refresh");

/// Handler for `GET /diagnostics/logs`.
pub async fn get_logs_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let lines = state.logs.lines();
    let mut body = format!(
        "dialtone {} | {} | {} lines | sessions {} | media jobs {}\n\n",
        env!("CARGO_PKG_VERSION"),
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        lines.len(),
        state.flow.sessions().len(),
        state.flow.jobs().len(),
    );
    for line in lines {
        body.push_str(&line);
        body.push('\n');
    }

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (REFRESH, state.diagnostics.refresh_seconds.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        body,
    )
        .into_response()
}
