use askama::Template;
use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::error::FrontendError;
use crate::flows::enrollment::{EnrollmentFlow, EnrollmentStage};
use crate::handlers::views::{cell_views, hx_redirect, CodeCellsTemplate};
use crate::models::user::SessionBundle;
use crate::services::metrics::record_auth_operation;
use crate::session::store::SessionStore;

#[derive(Template)]
#[template(path = "setup_2fa.html")]
pub struct SetupPageTemplate {
    pub panel: String,
}

#[derive(Template)]
#[template(path = "enroll_panel.html")]
struct EnrollPanelTemplate {
    is_recovery: bool,
    uri: String,
    cells_html: String,
    error: String,
    has_error: bool,
    codes: Vec<String>,
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

/// MFA setup view. Only renderable while an enrollment walk exists for an
/// authenticated user (the route guard handles the latter); otherwise the
/// user is sent on to their landing area.
pub async fn setup_page(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
) -> Result<Response, FrontendError> {
    let Some(flow) = store.enrollment().await else {
        return Ok(Redirect::to(bundle.identity.role.landing_path()).into_response());
    };
    let page = SetupPageTemplate {
        panel: panel_html(&flow)?,
    };
    Ok(page.into_response())
}

pub async fn digit(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
    Query(query): Query<CellQuery>,
    Form(form): Form<ValueForm>,
) -> Result<Response, FrontendError> {
    apply(store, bundle, |flow| flow.digit(query.cell, &form.value)).await
}

pub async fn backspace(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
    Query(query): Query<CellQuery>,
) -> Result<Response, FrontendError> {
    apply(store, bundle, |flow| flow.backspace(query.cell)).await
}

pub async fn paste(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
    Form(form): Form<PasteForm>,
) -> Result<Response, FrontendError> {
    apply(store, bundle, |flow| flow.paste(&form.text)).await
}

/// Explicit confirmation of the first authenticator code; unlike the login
/// challenge nothing here submits automatically.
pub async fn confirm(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
) -> Result<Response, FrontendError> {
    let Some(mut flow) = store.enrollment().await else {
        return Ok(hx_redirect(bundle.identity.role.landing_path()));
    };
    let code = match flow.submit_code() {
        Ok(code) => code,
        Err(message) => {
            flow.set_error(message);
            store.store_enrollment(&flow).await?;
            return panel_response(&flow);
        }
    };
    match store.confirm_enrollment(&code).await {
        Ok(()) => {
            record_auth_operation("enrollment_confirm", "completed");
            tracing::info!(user_id = %bundle.identity.id, "MFA enrollment confirmed");
            let flow = store
                .enrollment()
                .await
                .ok_or_else(|| anyhow::anyhow!("enrollment state vanished after confirm"))?;
            panel_response(&flow)
        }
        Err(err) => {
            record_auth_operation(
                "enrollment_confirm",
                if err.is_service_failure() {
                    "error"
                } else {
                    "rejected"
                },
            );
            flow.fail(err.user_message());
            store.store_enrollment(&flow).await?;
            panel_response(&flow)
        }
    }
}

/// Skipping is possible until recovery codes have been generated; after
/// that only the explicit acknowledgement leaves the walk.
pub async fn skip(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
) -> Result<Response, FrontendError> {
    if let Some(flow) = store.enrollment().await {
        if !flow.can_skip() {
            return Ok(hx_redirect("/auth/setup"));
        }
        store.clear_enrollment().await?;
        record_auth_operation("enrollment", "skipped");
        tracing::info!(user_id = %bundle.identity.id, "MFA enrollment skipped");
    }
    Ok(hx_redirect(bundle.identity.role.landing_path()))
}

/// Acknowledge the recovery codes. This destroys the enrollment artifact;
/// the codes cannot be displayed again afterwards.
pub async fn complete(
    store: SessionStore,
    Extension(bundle): Extension<SessionBundle>,
) -> Result<Response, FrontendError> {
    match store.enrollment().await {
        Some(flow) if flow.stage() == EnrollmentStage::Recovery => {
            store.clear_enrollment().await?;
            record_auth_operation("enrollment", "completed");
            Ok(hx_redirect(bundle.identity.role.landing_path()))
        }
        Some(_) => Ok(hx_redirect("/auth/setup")),
        None => Ok(hx_redirect(bundle.identity.role.landing_path())),
    }
}

/// Download of the recovery codes held by the current walk; nothing is
/// fetched from the backend again.
pub async fn download_recovery_codes(store: SessionStore) -> Result<Response, FrontendError> {
    let export = match store.enrollment().await {
        Some(flow) => flow.recovery_codes_export(),
        None => None,
    };
    match export {
        Some(text) => Ok((
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"cliniclab-recovery-codes.txt\"",
                ),
            ],
            text,
        )
            .into_response()),
        None => Ok(Redirect::to("/auth/setup").into_response()),
    }
}

async fn apply(
    store: SessionStore,
    bundle: SessionBundle,
    mutate: impl FnOnce(&mut EnrollmentFlow),
) -> Result<Response, FrontendError> {
    let Some(mut flow) = store.enrollment().await else {
        return Ok(hx_redirect(bundle.identity.role.landing_path()));
    };
    mutate(&mut flow);
    store.store_enrollment(&flow).await?;
    panel_response(&flow)
}

fn panel_html(flow: &EnrollmentFlow) -> Result<String, FrontendError> {
    let cells = CodeCellsTemplate {
        base: "/auth/setup",
        target: "#setup-panel",
        cells: cell_views(flow.input()),
    };
    let panel = EnrollPanelTemplate {
        is_recovery: flow.stage() == EnrollmentStage::Recovery,
        uri: flow.provisioning_uri().to_string(),
        cells_html: cells.render().map_err(anyhow::Error::new)?,
        error: flow.error().unwrap_or_default().to_string(),
        has_error: flow.error().is_some(),
        codes: flow
            .recovery_codes()
            .map(|codes| codes.to_vec())
            .unwrap_or_default(),
    };
    Ok(panel.render().map_err(anyhow::Error::new)?)
}

fn panel_response(flow: &EnrollmentFlow) -> Result<Response, FrontendError> {
    Ok(axum::response::Html(panel_html(flow)?).into_response())
}
