use askama::Template;
use axum::{response::IntoResponse, Extension};

use crate::models::user::SessionBundle;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub name: String,
    pub role: &'static str,
    pub org_name: String,
    pub has_org: bool,
    pub mfa_enabled: bool,
}

/// Administrative dashboard placeholder. The guard has already resolved and
/// role-checked the session; the bundle arrives through request extensions.
pub async fn dashboard_handler(Extension(bundle): Extension<SessionBundle>) -> impl IntoResponse {
    DashboardTemplate {
        name: bundle.identity.display_name().to_string(),
        role: bundle.identity.role.as_str(),
        org_name: bundle
            .organization
            .as_ref()
            .map(|org| org.name.clone())
            .unwrap_or_default(),
        has_org: bundle.organization.is_some(),
        mfa_enabled: bundle.identity.mfa_enabled,
    }
}
