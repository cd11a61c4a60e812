use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use crate::error::ApiError;
use crate::flows::{challenge::ChallengeFlow, enrollment::EnrollmentFlow};
use crate::models::user::{
    LoginOutcome, PatientRegistration, PendingChallenge, ProfessionalRegistration,
    RegistrationOutcome, SessionBundle,
};
use crate::services::auth_client::AuthClient;
use crate::session::credentials::SessionCredentials;
use crate::AppState;

/// Versioned storage keys for the in-flight security artifacts. These live
/// in the server-side session store only; nothing beyond the two credential
/// keys ever reaches the cookie.
pub const PENDING_CHALLENGE_KEY: &str = "cliniclab.v1.pending_challenge";
pub const CHALLENGE_INPUT_KEY: &str = "cliniclab.v1.challenge_input";
pub const ENROLLMENT_KEY: &str = "cliniclab.v1.enrollment";

/// Resolved authentication state for one browser session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated(SessionBundle),
    ChallengePending(PendingChallenge),
}

/// The single mutation surface for authentication state. Handlers obtain it
/// as an extractor; every view reads identity through `resolve()` and every
/// write goes through one of the operations below. Nothing else touches the
/// session keys.
pub struct SessionStore {
    client: Arc<AuthClient>,
    session: Session,
    credentials: SessionCredentials,
}

impl SessionStore {
    pub fn new(client: Arc<AuthClient>, session: Session) -> Self {
        let credentials = SessionCredentials::new(session.clone());
        Self {
            client,
            session,
            credentials,
        }
    }

    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    /// `Unknown → {Anonymous | Authenticated | ChallengePending}`.
    ///
    /// A pending challenge takes precedence: while one exists there is no
    /// session credential to restore from. Otherwise the identity is rebuilt
    /// from the persisted credential; a failed restore is routine (expired
    /// or rejected token) and degrades to logout rather than surfacing an
    /// error.
    pub async fn resolve(&self) -> SessionState {
        if let Some(pending) = self.pending_challenge().await {
            return SessionState::ChallengePending(pending);
        }
        match self.client.restore_identity(&self.credentials).await {
            Ok(bundle) => SessionState::Authenticated(bundle),
            Err(ApiError::Unauthenticated) => {
                self.logout().await;
                SessionState::Anonymous
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity restore failed, dropping session");
                self.logout().await;
                SessionState::Anonymous
            }
        }
    }

    /// Password login. On `ElevationRequired` the pending challenge and a
    /// fresh input surface are stored and the outcome is returned without
    /// error; on rejection nothing changes and the error propagates to the
    /// view for inline display.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let outcome = self.client.login(&self.credentials, email, password).await?;
        match &outcome {
            LoginOutcome::Completed(_) => {
                self.discard_challenge().await?;
            }
            LoginOutcome::ElevationRequired(pending) => {
                self.session
                    .insert(PENDING_CHALLENGE_KEY, pending)
                    .await
                    .map_err(storage)?;
                self.session
                    .insert(CHALLENGE_INPUT_KEY, ChallengeFlow::default())
                    .await
                    .map_err(storage)?;
            }
        }
        Ok(outcome)
    }

    /// Complete the elevation challenge. A rejected code leaves the pending
    /// challenge in place so the user can retry without re-entering the
    /// password.
    pub async fn verify_challenge(
        &self,
        code: &str,
        trust_device: bool,
        device_name: &str,
    ) -> Result<SessionBundle, ApiError> {
        let pending = self
            .pending_challenge()
            .await
            .ok_or(ApiError::Unauthenticated)?;
        let bundle = self
            .client
            .verify_challenge(
                &self.credentials,
                &pending.temp_token,
                code,
                trust_device,
                device_name,
            )
            .await?;
        self.discard_challenge().await?;
        Ok(bundle)
    }

    pub async fn register_patient(
        &self,
        registration: &PatientRegistration,
    ) -> Result<SessionBundle, ApiError> {
        self.client
            .register_patient(&self.credentials, registration)
            .await
    }

    /// Professional registration; when the backend provisions an MFA secret
    /// the enrollment walk is started alongside the new session.
    pub async fn register_professional(
        &self,
        registration: &ProfessionalRegistration,
    ) -> Result<RegistrationOutcome, ApiError> {
        let outcome = self
            .client
            .register_professional(&self.credentials, registration)
            .await?;
        if let Some(uri) = &outcome.provisioning_uri {
            self.store_enrollment(&EnrollmentFlow::new(uri.clone()))
                .await?;
        }
        Ok(outcome)
    }

    /// Confirm MFA enrollment with a first authenticator code; on success
    /// the stored walk advances to the recovery stage carrying the
    /// freshly-disclosed codes.
    pub async fn confirm_enrollment(&self, code: &str) -> Result<(), ApiError> {
        let mut flow = self.enrollment().await.ok_or(ApiError::Unauthenticated)?;
        let codes = self
            .client
            .confirm_enrollment(&self.credentials, code)
            .await?;
        flow.confirmed(codes);
        self.store_enrollment(&flow).await?;
        Ok(())
    }

    /// Drop the session credential and every in-flight artifact. Safe from
    /// any state and safe to repeat; storage hiccups are logged, not
    /// propagated. The device-trust credential is deliberately kept so the
    /// next login on this browser can still skip the challenge.
    pub async fn logout(&self) {
        if let Err(err) = self.client.logout(&self.credentials).await {
            tracing::warn!(error = %err, "failed to drop session credential");
        }
        for key in [PENDING_CHALLENGE_KEY, CHALLENGE_INPUT_KEY, ENROLLMENT_KEY] {
            if let Err(err) = self.session.remove::<serde_json::Value>(key).await {
                tracing::warn!(key, error = %err, "failed to clear session entry");
            }
        }
    }

    /// Walk away from a half-finished elevation: the pending challenge and
    /// its input surface are destroyed with no server notification.
    pub async fn abandon_challenge(&self) -> Result<(), ApiError> {
        self.discard_challenge().await
    }

    pub async fn pending_challenge(&self) -> Option<PendingChallenge> {
        self.session
            .get(PENDING_CHALLENGE_KEY)
            .await
            .unwrap_or(None)
    }

    pub async fn challenge_flow(&self) -> Option<ChallengeFlow> {
        self.session.get(CHALLENGE_INPUT_KEY).await.unwrap_or(None)
    }

    pub async fn store_challenge_flow(&self, flow: &ChallengeFlow) -> Result<(), ApiError> {
        self.session
            .insert(CHALLENGE_INPUT_KEY, flow)
            .await
            .map_err(storage)
    }

    pub async fn enrollment(&self) -> Option<EnrollmentFlow> {
        self.session.get(ENROLLMENT_KEY).await.unwrap_or(None)
    }

    pub async fn store_enrollment(&self, flow: &EnrollmentFlow) -> Result<(), ApiError> {
        self.session
            .insert(ENROLLMENT_KEY, flow)
            .await
            .map_err(storage)
    }

    pub async fn clear_enrollment(&self) -> Result<(), ApiError> {
        self.session
            .remove::<EnrollmentFlow>(ENROLLMENT_KEY)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn discard_challenge(&self) -> Result<(), ApiError> {
        self.session
            .remove::<PendingChallenge>(PENDING_CHALLENGE_KEY)
            .await
            .map_err(storage)?;
        self.session
            .remove::<ChallengeFlow>(CHALLENGE_INPUT_KEY)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

fn storage(err: tower_sessions::session::Error) -> ApiError {
    ApiError::Session(err.into())
}

#[async_trait]
impl FromRequestParts<AppState> for SessionStore {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(SessionStore::new(state.auth_client.clone(), session))
    }
}
