//! Telephony webhook handlers.
//!
//! Every call-flow route shares one handler parameterised by its [`Step`].
//! An unreadable form body is passed on as an empty event, which the flow
//! answers as a malformed event rather than an HTTP error.

use crate::flow::{Step, WebhookParams};
use crate::twiml::VoiceResponse;
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// `CallStatus` values after which the provider sends no more events.
const TERMINAL_CALL_STATUSES: &[&str] = &["completed", "busy", "failed", "no-answer", "canceled"];

/// Routes for every call-flow step plus the status callback.
pub fn routes() -> Router {
    let mut router = Router::new();
    for step in Step::ALL {
        router = router.route(
            step.path(),
            post(
                move |Extension(state): Extension<Arc<AppState>>,
                      form: Result<Form<WebhookParams>, FormRejection>| async move {
                    webhook(step, state, form).await
                },
            ),
        );
    }
    router.route("/voice/status", post(status_handler))
}

async fn webhook(
    step: Step,
    state: Arc<AppState>,
    form: Result<Form<WebhookParams>, FormRejection>,
) -> VoiceResponse {
    let params = match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            tracing::warn!(step = step.as_str(), error = %rejection, "unreadable webhook body");
            WebhookParams::default()
        }
    };
    state.flow.handle(step, params).await
}

/// Handler for `POST /voice/status`: releases a finished call's state.
pub async fn status_handler(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<WebhookParams>, FormRejection>,
) -> StatusCode {
    let Ok(Form(params)) = form else {
        return StatusCode::BAD_REQUEST;
    };
    let (Some(call_id), Some(status)) = (params.call_sid, params.call_status) else {
        return StatusCode::BAD_REQUEST;
    };

    if TERMINAL_CALL_STATUSES.contains(&status.as_str()) {
        state.flow.end_call(&call_id);
    } else {
        tracing::debug!(call_id = %call_id, status = %status, "call status update");
    }
    StatusCode::NO_CONTENT
}
