//! Stub identity/booking API implementing the contract the front-end
//! consumes, with canned accounts:
//!
//! - `patient@cliniclab.dz` / `password123`: plain login, no MFA
//! - `admin@clinic.dz` / `password123`: MFA enabled, temp token `T1`,
//!   accepted challenge code `482913`
//! - professional registration issues `PRO-TOKEN` plus a provisioning URI;
//!   enrollment confirm accepts `000000`
//!
//! Every failed login answers with a rotated `X-Device-Token` header so
//! rotation-on-error is observable.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub const SESSION_TOKEN: &str = "S1";
pub const PATIENT_TOKEN: &str = "PATIENT-TOKEN";
pub const PRO_TOKEN: &str = "PRO-TOKEN";
pub const TEMP_TOKEN: &str = "T1";
pub const GOOD_CODE: &str = "482913";
pub const ENROLL_CODE: &str = "000000";
pub const ROTATED_ON_ERROR: &str = "DEVICE-ROTATED-ON-ERROR";
pub const ROTATED_ON_TRUST: &str = "DEVICE-TRUSTED-1";

#[derive(Default)]
pub struct StubState {
    pub verify_calls: AtomicUsize,
}

pub async fn spawn_identity_stub() -> (String, Arc<StubState>) {
    let state = Arc::new(StubState::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/verify-2fa", post(verify))
        .route("/auth/me", get(me))
        .route("/auth/register/patient", post(register_patient))
        .route("/auth/register/professional", post(register_professional))
        .route("/auth/setup-2fa", post(setup))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    (format!("http://{addr}"), state)
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, HeaderMap, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let mut headers = HeaderMap::new();

    match (email, password) {
        ("patient@cliniclab.dz", "password123") => (
            StatusCode::OK,
            headers,
            Json(json!({
                "token": PATIENT_TOKEN,
                "user": {
                    "id": "u-patient",
                    "email": "patient@cliniclab.dz",
                    "role": "PATIENT",
                    "full_name": "Sara B.",
                    "is_2fa_enabled": false,
                },
            })),
        ),
        ("admin@clinic.dz", "password123") => (
            StatusCode::OK,
            headers,
            Json(json!({
                "requires_2fa": true,
                "temp_token": TEMP_TOKEN,
                "user": {
                    "id": "u-admin",
                    "email": "admin@clinic.dz",
                    "role": "CLINIC_ADMIN",
                },
            })),
        ),
        _ => {
            headers.insert("X-Device-Token", ROTATED_ON_ERROR.parse().unwrap());
            (
                StatusCode::UNAUTHORIZED,
                headers,
                error_body("Invalid email or password"),
            )
        }
    }
}

async fn verify(
    State(state): State<Arc<StubState>>,
    Json(body): Json<Value>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    state.verify_calls.fetch_add(1, Ordering::SeqCst);
    let mut headers = HeaderMap::new();

    let temp_token = body["temp_token"].as_str().unwrap_or_default();
    let code = body["code"].as_str().unwrap_or_default();
    if temp_token != TEMP_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            headers,
            error_body("The temporary token has expired. Sign in again"),
        );
    }
    if code != GOOD_CODE {
        return (
            StatusCode::UNAUTHORIZED,
            headers,
            error_body("The code is incorrect"),
        );
    }

    if body["trust_device"].as_bool().unwrap_or(false) {
        headers.insert("X-Device-Token", ROTATED_ON_TRUST.parse().unwrap());
    }
    (
        StatusCode::OK,
        headers,
        Json(json!({
            "token": SESSION_TOKEN,
            "user": {
                "id": "u-admin",
                "email": "admin@clinic.dz",
                "role": "CLINIC_ADMIN",
                "business_name": "El Amal Clinic",
                "is_2fa_enabled": true,
            },
            "org": { "id": "org-1", "name": "El Amal Clinic", "org_type": "CLINIC" },
        })),
    )
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    match bearer {
        t if t == SESSION_TOKEN => (
            StatusCode::OK,
            Json(json!({
                "user": {
                    "id": "u-admin",
                    "email": "admin@clinic.dz",
                    "role": "CLINIC_ADMIN",
                    "is_2fa_enabled": true,
                },
                "profile": { "business_name": "El Amal Clinic", "account_type": "clinic" },
                "org": { "id": "org-1", "name": "El Amal Clinic", "org_type": "CLINIC" },
            })),
        ),
        t if t == PATIENT_TOKEN => (
            StatusCode::OK,
            Json(json!({
                "user": {
                    "id": "u-patient",
                    "email": "patient@cliniclab.dz",
                    "role": "PATIENT",
                    "is_2fa_enabled": false,
                },
                "profile": { "full_name": "Sara B." },
            })),
        ),
        t if t == PRO_TOKEN => (
            StatusCode::OK,
            Json(json!({
                "user": {
                    "id": "u-pro",
                    "email": "lab@cliniclab.dz",
                    "role": "LAB_ADMIN",
                    "is_2fa_enabled": false,
                },
                "profile": { "business_name": "Ibn Sina Lab", "account_type": "lab" },
                "org": { "id": "org-2", "name": "Ibn Sina Lab", "org_type": "LAB" },
            })),
        ),
        _ => (StatusCode::UNAUTHORIZED, error_body("unauthorized")),
    }
}

async fn register_patient(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    (
        StatusCode::CREATED,
        Json(json!({
            "token": PATIENT_TOKEN,
            "user": {
                "id": "u-patient-new",
                "email": email,
                "role": "PATIENT",
                "full_name": body["full_name"],
            },
        })),
    )
}

async fn register_professional(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    (
        StatusCode::CREATED,
        Json(json!({
            "token": PRO_TOKEN,
            "totp_uri": "otpauth://totp/ClinicLab:lab@cliniclab.dz?secret=JBSWY3DPEHPK3PXP",
            "user": {
                "id": "u-pro",
                "email": email,
                "role": "LAB_ADMIN",
                "business_name": body["business_name"],
                "is_2fa_enabled": false,
            },
            "org": { "id": "org-2", "name": body["business_name"], "org_type": "LAB" },
        })),
    )
}

async fn setup(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if bearer != PRO_TOKEN && bearer != SESSION_TOKEN {
        return (StatusCode::UNAUTHORIZED, error_body("unauthorized"));
    }
    if body["code"].as_str().unwrap_or_default() != ENROLL_CODE {
        return (
            StatusCode::BAD_REQUEST,
            error_body("The code is incorrect. Check your authenticator app"),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "recovery_codes": ["AAAA-1111", "BBBB-2222", "CCCC-3333", "DDDD-4444", "EEEE-5555"],
        })),
    )
}
