//! Session and MFA lifecycle tests against a stub identity API.

mod support;

use std::sync::{atomic::Ordering, Arc};

use tower_sessions::{MemoryStore, Session};

use cliniclab_frontend::config::ApiSettings;
use cliniclab_frontend::error::ApiError;
use cliniclab_frontend::flows::challenge::ChallengeFlow;
use cliniclab_frontend::flows::enrollment::EnrollmentStage;
use cliniclab_frontend::models::user::{LoginOutcome, ProfessionalRegistration, Role};
use cliniclab_frontend::services::auth_client::AuthClient;
use cliniclab_frontend::session::credentials::{CredentialStore, MemoryCredentials};
use cliniclab_frontend::session::store::{SessionState, SessionStore};

use support::spawn_identity_stub;

fn client(base_url: &str) -> Arc<AuthClient> {
    Arc::new(AuthClient::new(ApiSettings {
        base_url: base_url.to_string(),
    }))
}

fn session_store(base_url: &str) -> SessionStore {
    let session = Session::new(None, Arc::new(MemoryStore::default()), None);
    SessionStore::new(client(base_url), session)
}

fn professional_registration() -> ProfessionalRegistration {
    ProfessionalRegistration {
        business_name: "Ibn Sina Lab".to_string(),
        email: "lab@cliniclab.dz".to_string(),
        password: "strongpassword".to_string(),
        confirm_password: "strongpassword".to_string(),
        phone: "0550 000 000".to_string(),
        account_type: "lab".to_string(),
        address: String::new(),
    }
}

#[tokio::test]
async fn completed_login_persists_the_session_token() {
    let (base_url, _) = spawn_identity_stub().await;
    let creds = MemoryCredentials::default();

    let outcome = client(&base_url)
        .login(&creds, "patient@cliniclab.dz", "password123")
        .await
        .unwrap();

    match outcome {
        LoginOutcome::Completed(bundle) => {
            assert_eq!(bundle.identity.role, Role::Patient);
        }
        other => panic!("expected a completed login, got {other:?}"),
    }
    assert_eq!(
        creds.session_token().await.unwrap().as_deref(),
        Some(support::PATIENT_TOKEN)
    );
}

#[tokio::test]
async fn elevation_login_persists_nothing_until_the_challenge_succeeds() {
    let (base_url, stub) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    let outcome = store.login("admin@clinic.dz", "password123").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::ElevationRequired(_)));
    assert_eq!(store.credentials().session_token().await.unwrap(), None);

    match store.resolve().await {
        SessionState::ChallengePending(pending) => {
            assert_eq!(pending.temp_token, support::TEMP_TOKEN);
            assert_eq!(pending.identity.role, Role::ClinicAdmin);
        }
        other => panic!("expected a pending challenge, got {other:?}"),
    }

    // A wrong code is rejected but leaves the challenge in place: the next
    // attempt needs no new password login.
    let err = store
        .verify_challenge("000000", false, "test-device")
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
    assert_eq!(store.credentials().session_token().await.unwrap(), None);
    assert!(store.pending_challenge().await.is_some());
    assert_eq!(stub.verify_calls.load(Ordering::SeqCst), 1);

    let bundle = store
        .verify_challenge(support::GOOD_CODE, true, "test-device")
        .await
        .unwrap();
    assert_eq!(bundle.identity.role, Role::ClinicAdmin);
    assert_eq!(
        store.credentials().session_token().await.unwrap().as_deref(),
        Some(support::SESSION_TOKEN)
    );
    assert!(store.pending_challenge().await.is_none());
    assert_eq!(stub.verify_calls.load(Ordering::SeqCst), 2);

    assert!(matches!(
        store.resolve().await,
        SessionState::Authenticated(_)
    ));
}

#[tokio::test]
async fn rotated_device_token_is_stored_even_when_the_request_fails() {
    let (base_url, _) = spawn_identity_stub().await;
    let creds = MemoryCredentials::default();
    creds.store_device_token("OLD-DEVICE").await.unwrap();

    let err = client(&base_url)
        .login(&creds, "patient@cliniclab.dz", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Api { .. }));

    assert_eq!(
        creds.device_token().await.unwrap().as_deref(),
        Some(support::ROTATED_ON_ERROR)
    );
}

#[tokio::test]
async fn trusting_the_device_stores_the_rotated_credential() {
    let (base_url, _) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    store.login("admin@clinic.dz", "password123").await.unwrap();
    store
        .verify_challenge(support::GOOD_CODE, true, "test-device")
        .await
        .unwrap();

    assert_eq!(
        store.credentials().device_token().await.unwrap().as_deref(),
        Some(support::ROTATED_ON_TRUST)
    );
}

#[tokio::test]
async fn restore_without_a_token_is_plain_unauthenticated() {
    let (base_url, _) = spawn_identity_stub().await;
    let creds = MemoryCredentials::default();

    let err = client(&base_url).restore_identity(&creds).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
}

#[tokio::test]
async fn failed_restore_degrades_to_logout() {
    let (base_url, _) = spawn_identity_stub().await;
    let store = session_store(&base_url);
    store
        .credentials()
        .store_session_token("EXPIRED-TOKEN")
        .await
        .unwrap();

    assert_eq!(store.resolve().await, SessionState::Anonymous);
    assert_eq!(store.credentials().session_token().await.unwrap(), None);
}

#[tokio::test]
async fn logout_is_idempotent_and_keeps_the_device_trust_credential() {
    let (base_url, _) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    store.login("admin@clinic.dz", "password123").await.unwrap();
    store
        .verify_challenge(support::GOOD_CODE, true, "test-device")
        .await
        .unwrap();

    store.logout().await;
    store.logout().await;

    assert_eq!(store.resolve().await, SessionState::Anonymous);
    assert_eq!(store.credentials().session_token().await.unwrap(), None);
    // The device stays recognized so the next login can skip the challenge.
    assert_eq!(
        store.credentials().device_token().await.unwrap().as_deref(),
        Some(support::ROTATED_ON_TRUST)
    );
}

#[tokio::test]
async fn a_six_digit_paste_makes_exactly_one_verification_call() {
    let (base_url, stub) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    store.login("admin@clinic.dz", "password123").await.unwrap();

    let mut flow = ChallengeFlow::default();
    assert_eq!(flow.paste("48291"), None);
    let code = flow.paste(support::GOOD_CODE).expect("paste completes the code");

    store
        .verify_challenge(&code, false, "test-device")
        .await
        .unwrap();
    assert_eq!(stub.verify_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn abandoning_the_challenge_returns_to_anonymous() {
    let (base_url, _) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    store.login("admin@clinic.dz", "password123").await.unwrap();
    assert!(store.pending_challenge().await.is_some());

    store.abandon_challenge().await.unwrap();
    assert!(store.pending_challenge().await.is_none());
    assert_eq!(store.resolve().await, SessionState::Anonymous);
}

#[tokio::test]
async fn professional_registration_walks_through_enrollment() {
    let (base_url, _) = spawn_identity_stub().await;
    let store = session_store(&base_url);

    let outcome = store
        .register_professional(&professional_registration())
        .await
        .unwrap();
    assert_eq!(outcome.session.identity.role, Role::LabAdmin);
    assert!(outcome.provisioning_uri.is_some());
    assert_eq!(
        store.credentials().session_token().await.unwrap().as_deref(),
        Some(support::PRO_TOKEN)
    );

    let flow = store.enrollment().await.expect("enrollment walk started");
    assert_eq!(flow.stage(), EnrollmentStage::Scan);
    assert!(flow.provisioning_uri().starts_with("otpauth://"));

    // A wrong confirmation code keeps the walk where it is.
    let err = store.confirm_enrollment("999999").await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
    assert_eq!(
        store.enrollment().await.unwrap().stage(),
        EnrollmentStage::Scan
    );

    store.confirm_enrollment(support::ENROLL_CODE).await.unwrap();
    let flow = store.enrollment().await.unwrap();
    assert_eq!(flow.stage(), EnrollmentStage::Recovery);
    assert_eq!(flow.recovery_codes().unwrap().len(), 5);
    assert!(!flow.can_skip());

    // Explicit acknowledgement destroys the artifact; the codes cannot be
    // rendered again.
    store.clear_enrollment().await.unwrap();
    assert!(store.enrollment().await.is_none());
}
