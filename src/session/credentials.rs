use async_trait::async_trait;
use tower_sessions::Session;

/// Versioned storage keys for the two credentials that outlive a page load.
pub const SESSION_TOKEN_KEY: &str = "cliniclab.v1.session_token";
pub const DEVICE_TOKEN_KEY: &str = "cliniclab.v1.device_token";

/// Persistence seam for the two credentials the transport manages: the
/// bearer session token and the rotating device-trust token. The transport
/// only ever talks to this trait, so the same client code runs against the
/// browser session in handlers and against an in-memory store in tests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn session_token(&self) -> anyhow::Result<Option<String>>;
    async fn store_session_token(&self, token: &str) -> anyhow::Result<()>;
    async fn clear_session_token(&self) -> anyhow::Result<()>;

    async fn device_token(&self) -> anyhow::Result<Option<String>>;
    async fn store_device_token(&self, token: &str) -> anyhow::Result<()>;
}

/// Credential store backed by the tower-sessions browser session.
#[derive(Clone)]
pub struct SessionCredentials {
    session: Session,
}

impl SessionCredentials {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CredentialStore for SessionCredentials {
    async fn session_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.session.get(SESSION_TOKEN_KEY).await?)
    }

    async fn store_session_token(&self, token: &str) -> anyhow::Result<()> {
        self.session.insert(SESSION_TOKEN_KEY, token).await?;
        Ok(())
    }

    async fn clear_session_token(&self) -> anyhow::Result<()> {
        self.session.remove::<String>(SESSION_TOKEN_KEY).await?;
        Ok(())
    }

    async fn device_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.session.get(DEVICE_TOKEN_KEY).await?)
    }

    async fn store_device_token(&self, token: &str) -> anyhow::Result<()> {
        self.session.insert(DEVICE_TOKEN_KEY, token).await?;
        Ok(())
    }
}

/// In-memory credential store for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    inner: std::sync::Mutex<MemoryTokens>,
}

#[derive(Debug, Default)]
struct MemoryTokens {
    session_token: Option<String>,
    device_token: Option<String>,
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn session_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.inner.lock().unwrap().session_token.clone())
    }

    async fn store_session_token(&self, token: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().session_token = Some(token.to_string());
        Ok(())
    }

    async fn clear_session_token(&self) -> anyhow::Result<()> {
        self.inner.lock().unwrap().session_token = None;
        Ok(())
    }

    async fn device_token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.inner.lock().unwrap().device_token.clone())
    }

    async fn store_device_token(&self, token: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().device_token = Some(token.to_string());
        Ok(())
    }
}
