use axum::{
    body::Body,
    extract::Query,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Deserialize)]
struct PasswordQuery {
    password: Option<String>,
}

/// Gates the diagnostics routes behind `?password=`.
///
/// Responds 404 when no password is configured, so a deployment without one
/// does not reveal the endpoint, and 401 when the password is missing or
/// wrong.
pub async fn diagnostics_gate(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let Some(expected) = state.diagnostics.password.as_deref() else {
        return Err(StatusCode::NOT_FOUND);
    };

    let supplied = Query::<PasswordQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.password);

    if supplied.as_deref() != Some(expected) {
        tracing::warn!(path = %req.uri().path(), "rejected diagnostics request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
