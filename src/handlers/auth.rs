use askama::Template;
use axum::{extract::Query, response::Response, Form};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use validator::Validate;

use crate::error::FrontendError;
use crate::handlers::views::{
    error_fragment, first_validation_message, hx_redirect, sanitize_next,
};
use crate::models::user::{LoginOutcome, PatientRegistration, ProfessionalRegistration};
use crate::services::metrics::record_auth_operation;
use crate::session::store::SessionStore;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub next: String,
}

#[derive(Template)]
#[template(path = "register_patient.html")]
pub struct RegisterPatientTemplate {}

#[derive(Template)]
#[template(path = "register_professional.html")]
pub struct RegisterProfessionalTemplate {}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password: Secret<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPatientForm {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    pub password: Secret<String>,
    pub confirm_password: Secret<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterProfessionalForm {
    #[validate(length(min = 1, message = "Business name is required"))]
    pub business_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub account_type: String,
    pub password: Secret<String>,
    pub confirm_password: Secret<String>,
}

/// Visiting the login page abandons any half-finished elevation challenge;
/// it is only reachable again through a fresh password login.
pub async fn login_page(
    store: SessionStore,
    Query(query): Query<NextQuery>,
) -> Result<LoginTemplate, FrontendError> {
    store.abandon_challenge().await?;
    Ok(LoginTemplate {
        next: query.next.unwrap_or_default(),
    })
}

pub async fn login_handler(
    store: SessionStore,
    Form(form): Form<LoginForm>,
) -> Result<Response, FrontendError> {
    if let Err(errors) = form.validate() {
        return Ok(error_fragment(&first_validation_message(&errors)));
    }
    if form.password.expose_secret().is_empty() {
        return Ok(error_fragment("Password is required"));
    }

    match store
        .login(&form.email, form.password.expose_secret())
        .await
    {
        Ok(LoginOutcome::Completed(bundle)) => {
            record_auth_operation("login", "completed");
            tracing::info!(
                user_id = %bundle.identity.id,
                role = bundle.identity.role.as_str(),
                "user logged in"
            );
            let target = sanitize_next(form.next.as_deref())
                .unwrap_or(bundle.identity.role.landing_path());
            Ok(hx_redirect(target))
        }
        Ok(LoginOutcome::ElevationRequired(_)) => {
            record_auth_operation("login", "challenge");
            Ok(hx_redirect("/auth/verify"))
        }
        Err(err) => {
            record_auth_operation(
                "login",
                if err.is_service_failure() {
                    "error"
                } else {
                    "rejected"
                },
            );
            Ok(error_fragment(&err.user_message()))
        }
    }
}

pub async fn register_patient_page() -> RegisterPatientTemplate {
    RegisterPatientTemplate {}
}

pub async fn register_patient_handler(
    store: SessionStore,
    Form(form): Form<RegisterPatientForm>,
) -> Result<Response, FrontendError> {
    if let Err(errors) = form.validate() {
        return Ok(error_fragment(&first_validation_message(&errors)));
    }
    if let Some(message) = password_problem(&form.password, &form.confirm_password) {
        return Ok(error_fragment(message));
    }
    if !form.date_of_birth.is_empty()
        && chrono::NaiveDate::parse_from_str(&form.date_of_birth, "%Y-%m-%d").is_err()
    {
        return Ok(error_fragment("Enter the date of birth as YYYY-MM-DD"));
    }

    let registration = PatientRegistration {
        full_name: form.full_name,
        email: form.email,
        password: form.password.expose_secret().clone(),
        phone: form.phone,
        date_of_birth: form.date_of_birth,
        gender: form.gender,
    };

    match store.register_patient(&registration).await {
        Ok(bundle) => {
            record_auth_operation("register_patient", "completed");
            tracing::info!(user_id = %bundle.identity.id, "patient registered");
            Ok(hx_redirect(bundle.identity.role.landing_path()))
        }
        Err(err) => {
            record_auth_operation("register_patient", "rejected");
            Ok(error_fragment(&err.user_message()))
        }
    }
}

pub async fn register_professional_page() -> RegisterProfessionalTemplate {
    RegisterProfessionalTemplate {}
}

pub async fn register_professional_handler(
    store: SessionStore,
    Form(form): Form<RegisterProfessionalForm>,
) -> Result<Response, FrontendError> {
    if let Err(errors) = form.validate() {
        return Ok(error_fragment(&first_validation_message(&errors)));
    }
    if !matches!(form.account_type.as_str(), "clinic" | "lab") {
        return Ok(error_fragment("Choose a clinic or lab account"));
    }
    if let Some(message) = password_problem(&form.password, &form.confirm_password) {
        return Ok(error_fragment(message));
    }

    let registration = ProfessionalRegistration {
        business_name: form.business_name,
        email: form.email,
        password: form.password.expose_secret().clone(),
        confirm_password: form.confirm_password.expose_secret().clone(),
        phone: form.phone,
        account_type: form.account_type,
        address: form.address,
    };

    match store.register_professional(&registration).await {
        Ok(outcome) => {
            record_auth_operation("register_professional", "completed");
            tracing::info!(
                user_id = %outcome.session.identity.id,
                "professional registered"
            );
            // A provisioned MFA secret sends the new admin through setup
            // before they reach the dashboard.
            if outcome.provisioning_uri.is_some() {
                Ok(hx_redirect("/auth/setup"))
            } else {
                Ok(hx_redirect(outcome.session.identity.role.landing_path()))
            }
        }
        Err(err) => {
            record_auth_operation("register_professional", "rejected");
            Ok(error_fragment(&err.user_message()))
        }
    }
}

pub async fn logout_handler(store: SessionStore) -> Response {
    store.logout().await;
    record_auth_operation("logout", "completed");
    hx_redirect("/auth/login")
}

fn password_problem(
    password: &Secret<String>,
    confirm: &Secret<String>,
) -> Option<&'static str> {
    if password.expose_secret().len() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters");
    }
    if password.expose_secret() != confirm.expose_secret() {
        return Some("Passwords do not match");
    }
    None
}
