use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Typed failure produced by the API clients. Callers branch on the
/// structure (status code, payload) rather than matching message strings.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status. `message` is the
    /// backend's `error` field; `payload` is the raw error body so callers
    /// can inspect structured codes.
    #[error("{message}")]
    Api {
        message: String,
        status: StatusCode,
        payload: serde_json::Value,
    },

    /// No usable session credential: none held, or the backend rejected it.
    /// Routine during silent restore, never shown as an error banner.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response from the backend: {0}")]
    Malformed(String),

    /// The browser-session storage backing the credential store failed.
    #[error("session storage failed: {0}")]
    Session(#[from] anyhow::Error),
}

impl ApiError {
    pub(crate) fn rejection(status: StatusCode, payload: serde_json::Value) -> Self {
        let message = payload["error"]
            .as_str()
            .unwrap_or("The request was rejected")
            .to_string();
        ApiError::Api {
            message,
            status,
            payload,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for outages (network unreachable, 5xx) as opposed to the backend
    /// rejecting the submitted credentials; views use this to decide between
    /// "try again later" and the backend's own message.
    pub fn is_service_failure(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Malformed(_) | ApiError::Session(_) => true,
            ApiError::Api { status, .. } => status.is_server_error(),
            ApiError::Unauthenticated => false,
        }
    }

    /// Message suitable for an inline, dismissable banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api { message, status, .. } if !status.is_server_error() => message.clone(),
            ApiError::Unauthenticated => "Please sign in again.".to_string(),
            _ => "The service is temporarily unavailable. Please try again.".to_string(),
        }
    }
}

/// Minimal HTML escaping for strings interpolated into response fragments.
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Handler-level error envelope; converts infrastructure failures into
/// responses so handlers can use `?`.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for FrontendError {
    fn into_response(self) -> Response {
        match self {
            FrontendError::Api(ApiError::Unauthenticated) => {
                Redirect::to("/auth/login").into_response()
            }
            FrontendError::Api(err) => {
                tracing::error!(error = %err, "backend call failed");
                (
                    err.status().unwrap_or(StatusCode::BAD_GATEWAY),
                    Html(format!(
                        "<p class='text-red-500 text-sm'>{}</p>",
                        escape_html(&err.user_message())
                    )),
                )
                    .into_response()
            }
            FrontendError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<p class='text-red-500 text-sm'>Something went wrong</p>"),
                )
                    .into_response()
            }
        }
    }
}
