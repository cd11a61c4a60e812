use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{app, auth, challenge, dashboard, enrollment, metrics, search};
use crate::middleware::auth::{require_admin, require_session};
use crate::middleware::metrics::metrics_middleware;
use crate::middleware::tracing::request_id_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Session setup. The 30-day window matches the device-trust period so a
    // remembered device keeps its credential between visits.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_expiry(Expiry::OnInactivity(Duration::days(30)));

    let enrollment_routes = Router::new()
        .route("/auth/setup", get(enrollment::setup_page))
        .route("/auth/setup/digit", post(enrollment::digit))
        .route("/auth/setup/backspace", post(enrollment::backspace))
        .route("/auth/setup/paste", post(enrollment::paste))
        .route("/auth/setup/confirm", post(enrollment::confirm))
        .route("/auth/setup/skip", post(enrollment::skip))
        .route("/auth/setup/complete", post(enrollment::complete))
        .route(
            "/auth/setup/recovery-codes.txt",
            get(enrollment::download_recovery_codes),
        )
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(app::index))
        .route("/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .route("/search", get(search::search_page))
        .route("/auth/login", get(auth::login_page).post(auth::login_handler))
        .route(
            "/auth/register/patient",
            get(auth::register_patient_page).post(auth::register_patient_handler),
        )
        .route(
            "/auth/register/professional",
            get(auth::register_professional_page).post(auth::register_professional_handler),
        )
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/verify", get(challenge::verify_page))
        .route("/auth/verify/digit", post(challenge::digit))
        .route("/auth/verify/backspace", post(challenge::backspace))
        .route("/auth/verify/paste", post(challenge::paste))
        .route("/auth/verify/trust", post(challenge::toggle_trust))
        .route("/auth/verify/submit", post(challenge::submit))
        .merge(enrollment_routes)
        .route(
            "/dashboard",
            get(dashboard::dashboard_handler)
                .route_layer(from_fn_with_state(state.clone(), require_admin)),
        )
        .nest_service("/static", ServeDir::new("static"))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
