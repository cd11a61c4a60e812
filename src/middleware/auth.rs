use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::user::Role;
use crate::session::store::{SessionState, SessionStore};
use crate::AppState;

/// Roles allowed into the administrative area.
pub const ADMIN_ROLES: &[Role] = &[Role::ClinicAdmin, Role::LabAdmin, Role::PlatformAdmin];

/// Gate for any signed-in user.
pub async fn require_session(
    State(state): State<AppState>,
    session: Session,
    req: Request,
    next: Next,
) -> Response {
    enforce(state, session, None, req, next).await
}

/// Gate for the administrative roles.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    req: Request,
    next: Next,
) -> Response {
    enforce(state, session, Some(ADMIN_ROLES), req, next).await
}

/// Resolve the session once and either run the protected handler (with the
/// resolved bundle in request extensions), bounce to login carrying the
/// requested location, or bounce to the public landing area on a role
/// mismatch. A pending challenge counts as not signed in.
async fn enforce(
    state: AppState,
    session: Session,
    permitted: Option<&[Role]>,
    mut req: Request,
    next: Next,
) -> Response {
    let store = SessionStore::new(state.auth_client.clone(), session);
    match store.resolve().await {
        SessionState::Authenticated(bundle) => {
            if let Some(roles) = permitted {
                if !roles.contains(&bundle.identity.role) {
                    return Redirect::to("/").into_response();
                }
            }
            req.extensions_mut().insert(bundle);
            next.run(req).await
        }
        SessionState::Anonymous | SessionState::ChallengePending(_) => {
            Redirect::to(&login_redirect(&req)).into_response()
        }
    }
}

fn login_redirect(req: &Request) -> String {
    let requested = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    match serde_urlencoded::to_string([("next", requested)]) {
        Ok(query) => format!("/auth/login?{query}"),
        Err(_) => "/auth/login".to_string(),
    }
}
