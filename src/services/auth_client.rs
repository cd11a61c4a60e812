use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::user::{
    Identity, LoginOutcome, Organization, PatientRegistration, PendingChallenge, ProfileFields,
    ProfessionalRegistration, RegistrationOutcome, SessionBundle,
};
use crate::session::credentials::CredentialStore;

/// Header carrying the device-trust credential in both directions.
pub const DEVICE_TOKEN_HEADER: &str = "X-Device-Token";

/// The only component that talks to the identity service. It attaches the
/// bearer session credential and the device-trust credential to every
/// request, captures device-credential rotation from every response, and
/// converts non-2xx responses into a typed error.
pub struct AuthClient {
    client: Client,
    settings: ApiSettings,
}

/// Wire shape shared by login, registration and challenge responses; the
/// optional fields are disambiguated into typed outcomes right here so no
/// caller ever probes them.
#[derive(Debug, Deserialize)]
struct AuthResponsePayload {
    token: Option<String>,
    #[serde(default)]
    requires_2fa: bool,
    temp_token: Option<String>,
    totp_uri: Option<String>,
    user: Identity,
    org: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct MeResponsePayload {
    user: Identity,
    #[serde(default)]
    profile: Option<ProfileFields>,
    org: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct EnrollmentConfirmPayload {
    recovery_codes: Vec<String>,
}

impl AuthClient {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Password login. The session credential is persisted only when the
    /// response is a completed session; an elevation response carries a
    /// temporary token instead and persists nothing.
    pub async fn login(
        &self,
        creds: &dyn CredentialStore,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, ApiError> {
        let payload = self
            .send(
                creds,
                Method::POST,
                "/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        let parsed: AuthResponsePayload = decode(payload)?;

        if parsed.requires_2fa {
            let temp_token = parsed
                .temp_token
                .ok_or_else(|| ApiError::Malformed("elevation response without temp_token".into()))?;
            return Ok(LoginOutcome::ElevationRequired(PendingChallenge {
                temp_token,
                identity: parsed.user,
            }));
        }

        let token = required_token(parsed.token)?;
        creds.store_session_token(&token).await?;
        Ok(LoginOutcome::Completed(SessionBundle {
            identity: parsed.user,
            organization: parsed.org,
        }))
    }

    /// Complete the elevation challenge and persist the issued session
    /// credential. A rotated device-trust credential, when the caller opted
    /// in, is captured by the shared send path.
    pub async fn verify_challenge(
        &self,
        creds: &dyn CredentialStore,
        temp_token: &str,
        code: &str,
        trust_device: bool,
        device_name: &str,
    ) -> Result<SessionBundle, ApiError> {
        let payload = self
            .send(
                creds,
                Method::POST,
                "/auth/verify-2fa",
                Some(json!({
                    "temp_token": temp_token,
                    "code": code,
                    "trust_device": trust_device,
                    "device_name": device_name,
                })),
            )
            .await?;
        let parsed: AuthResponsePayload = decode(payload)?;

        let token = required_token(parsed.token)?;
        creds.store_session_token(&token).await?;
        Ok(SessionBundle {
            identity: parsed.user,
            organization: parsed.org,
        })
    }

    /// Rebuild the identity from the persisted session credential.
    pub async fn restore_identity(
        &self,
        creds: &dyn CredentialStore,
    ) -> Result<SessionBundle, ApiError> {
        if creds.session_token().await?.is_none() {
            return Err(ApiError::Unauthenticated);
        }
        let payload = match self.send(creds, Method::GET, "/auth/me", None).await {
            Ok(payload) => payload,
            Err(ApiError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                return Err(ApiError::Unauthenticated);
            }
            Err(err) => return Err(err),
        };
        let parsed: MeResponsePayload = decode(payload)?;

        let mut identity = parsed.user;
        if let Some(profile) = &parsed.profile {
            identity.absorb_profile(profile);
        }
        Ok(SessionBundle {
            identity,
            organization: parsed.org,
        })
    }

    pub async fn register_patient(
        &self,
        creds: &dyn CredentialStore,
        registration: &PatientRegistration,
    ) -> Result<SessionBundle, ApiError> {
        let body = serde_json::to_value(registration)
            .map_err(|e| ApiError::Malformed(e.to_string()))?;
        let payload = self
            .send(creds, Method::POST, "/auth/register/patient", Some(body))
            .await?;
        let parsed: AuthResponsePayload = decode(payload)?;

        let token = required_token(parsed.token)?;
        creds.store_session_token(&token).await?;
        Ok(SessionBundle {
            identity: parsed.user,
            organization: parsed.org,
        })
    }

    /// Professional registration additionally hands back an MFA provisioning
    /// URI when the backend created a secret for the new account.
    pub async fn register_professional(
        &self,
        creds: &dyn CredentialStore,
        registration: &ProfessionalRegistration,
    ) -> Result<RegistrationOutcome, ApiError> {
        let body = serde_json::to_value(registration)
            .map_err(|e| ApiError::Malformed(e.to_string()))?;
        let payload = self
            .send(
                creds,
                Method::POST,
                "/auth/register/professional",
                Some(body),
            )
            .await?;
        let parsed: AuthResponsePayload = decode(payload)?;

        let token = required_token(parsed.token)?;
        creds.store_session_token(&token).await?;
        Ok(RegistrationOutcome {
            session: SessionBundle {
                identity: parsed.user,
                organization: parsed.org,
            },
            provisioning_uri: parsed.totp_uri,
        })
    }

    /// Confirm MFA enrollment with a first authenticator code. Returns the
    /// one-time recovery codes; the session credential is not touched.
    pub async fn confirm_enrollment(
        &self,
        creds: &dyn CredentialStore,
        code: &str,
    ) -> Result<Vec<String>, ApiError> {
        let payload = self
            .send(
                creds,
                Method::POST,
                "/auth/setup-2fa",
                Some(json!({ "code": code })),
            )
            .await?;
        let parsed: EnrollmentConfirmPayload = decode(payload)?;
        Ok(parsed.recovery_codes)
    }

    /// Drop the session credential locally. The device-trust credential is
    /// not cleared; whether the server invalidates it is its own business.
    pub async fn logout(&self, creds: &dyn CredentialStore) -> Result<(), ApiError> {
        creds.clear_session_token().await?;
        Ok(())
    }

    async fn send(
        &self,
        creds: &dyn CredentialStore,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.settings.base_url, path);
        let mut request = self.client.request(method, &url);

        if let Some(token) = creds.session_token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(device) = creds.device_token().await? {
            request = request.header(DEVICE_TOKEN_HEADER, device);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "request to identity service failed");
            ApiError::Transport(e)
        })?;

        // A rotated device-trust credential must survive even a failed
        // request, so capture it before the body is touched.
        if let Some(rotated) = response
            .headers()
            .get(DEVICE_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            creds.store_device_token(rotated).await?;
        }

        let status = response.status();
        let payload: serde_json::Value = response.json().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::rejection(status, payload));
        }
        Ok(payload)
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::Malformed(e.to_string()))
}

fn required_token(token: Option<String>) -> Result<String, ApiError> {
    token.ok_or_else(|| ApiError::Malformed("completed session response without token".into()))
}
