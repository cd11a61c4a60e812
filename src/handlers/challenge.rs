use askama::Template;
use axum::{
    extract::Query,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::error::FrontendError;
use crate::flows::challenge::ChallengeFlow;
use crate::handlers::views::{cell_views, device_label, hx_redirect, CodeCellsTemplate};
use crate::services::metrics::record_auth_operation;
use crate::session::store::SessionStore;

#[derive(Template)]
#[template(path = "verify_2fa.html")]
pub struct VerifyPageTemplate {
    pub email: String,
    pub panel: String,
}

#[derive(Template)]
#[template(path = "challenge_panel.html")]
struct ChallengePanelTemplate {
    cells_html: String,
    trust_device: bool,
    error: String,
    has_error: bool,
}

#[derive(Debug, Deserialize)]
pub struct CellQuery {
    pub cell: usize,
}

#[derive(Debug, Deserialize)]
pub struct ValueForm {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PasteForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TrustForm {
    #[serde(default)]
    pub trust: Option<String>,
}

/// The challenge view is only reachable through a login that required
/// elevation; entered without one it bounces straight back to login.
pub async fn verify_page(store: SessionStore) -> Result<Response, FrontendError> {
    let Some(pending) = store.pending_challenge().await else {
        return Ok(Redirect::to("/auth/login").into_response());
    };
    let flow = store.challenge_flow().await.unwrap_or_default();
    let page = VerifyPageTemplate {
        email: pending.identity.email,
        panel: panel_html(&flow)?,
    };
    Ok(page.into_response())
}

pub async fn digit(
    store: SessionStore,
    headers: HeaderMap,
    Query(query): Query<CellQuery>,
    Form(form): Form<ValueForm>,
) -> Result<Response, FrontendError> {
    apply(store, headers, |flow| flow.digit(query.cell, &form.value)).await
}

pub async fn backspace(
    store: SessionStore,
    headers: HeaderMap,
    Query(query): Query<CellQuery>,
) -> Result<Response, FrontendError> {
    apply(store, headers, |flow| {
        flow.backspace(query.cell);
        None
    })
    .await
}

pub async fn paste(
    store: SessionStore,
    headers: HeaderMap,
    Form(form): Form<PasteForm>,
) -> Result<Response, FrontendError> {
    apply(store, headers, |flow| flow.paste(&form.text)).await
}

pub async fn toggle_trust(
    store: SessionStore,
    headers: HeaderMap,
    Form(form): Form<TrustForm>,
) -> Result<Response, FrontendError> {
    apply(store, headers, |flow| {
        flow.set_trust_device(form.trust.is_some());
        None
    })
    .await
}

/// The explicit submit action; completion is otherwise triggered the moment
/// the sixth digit lands.
pub async fn submit(store: SessionStore, headers: HeaderMap) -> Result<Response, FrontendError> {
    if store.pending_challenge().await.is_none() {
        return Ok(hx_redirect("/auth/login"));
    }
    let mut flow = store.challenge_flow().await.unwrap_or_default();
    match flow.submit() {
        Ok(code) => complete(store, flow, code, &headers).await,
        Err(message) => {
            flow.set_error(message);
            store.store_challenge_flow(&flow).await?;
            panel_response(&flow)
        }
    }
}

/// Shared skeleton of the input-event handlers: bail to login when no
/// challenge is pending, mutate the flow, and either verify (when the
/// mutation completed the code) or persist and re-render.
async fn apply(
    store: SessionStore,
    headers: HeaderMap,
    mutate: impl FnOnce(&mut ChallengeFlow) -> Option<String>,
) -> Result<Response, FrontendError> {
    if store.pending_challenge().await.is_none() {
        return Ok(hx_redirect("/auth/login"));
    }
    let mut flow = store.challenge_flow().await.unwrap_or_default();
    match mutate(&mut flow) {
        Some(code) => complete(store, flow, code, &headers).await,
        None => {
            store.store_challenge_flow(&flow).await?;
            panel_response(&flow)
        }
    }
}

async fn complete(
    store: SessionStore,
    mut flow: ChallengeFlow,
    code: String,
    headers: &HeaderMap,
) -> Result<Response, FrontendError> {
    let device_name = device_label(headers);
    match store
        .verify_challenge(&code, flow.trust_device(), &device_name)
        .await
    {
        Ok(bundle) => {
            record_auth_operation("challenge_verify", "completed");
            tracing::info!(
                user_id = %bundle.identity.id,
                trusted_device = flow.trust_device(),
                "elevation challenge completed"
            );
            Ok(hx_redirect(bundle.identity.role.landing_path()))
        }
        Err(err) => {
            record_auth_operation(
                "challenge_verify",
                if err.is_service_failure() {
                    "error"
                } else {
                    "rejected"
                },
            );
            // Wrong or expired code: cells reset, focus back to the first
            // cell, and the pending challenge stays so the user can retry
            // without re-entering the password.
            flow.fail(err.user_message());
            store.store_challenge_flow(&flow).await?;
            panel_response(&flow)
        }
    }
}

fn panel_html(flow: &ChallengeFlow) -> Result<String, FrontendError> {
    let cells = CodeCellsTemplate {
        base: "/auth/verify",
        target: "#challenge-panel",
        cells: cell_views(flow.input()),
    };
    let panel = ChallengePanelTemplate {
        cells_html: cells.render().map_err(anyhow::Error::new)?,
        trust_device: flow.trust_device(),
        error: flow.error().unwrap_or_default().to_string(),
        has_error: flow.error().is_some(),
    };
    Ok(panel.render().map_err(anyhow::Error::new)?)
}

fn panel_response(flow: &ChallengeFlow) -> Result<Response, FrontendError> {
    Ok(axum::response::Html(panel_html(flow)?).into_response())
}
