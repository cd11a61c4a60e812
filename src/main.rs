use cliniclab_frontend::config::get_configuration;
use cliniclab_frontend::observability::logging::init_tracing;
use cliniclab_frontend::services::auth_client::AuthClient;
use cliniclab_frontend::services::provider_client::ProviderClient;
use cliniclab_frontend::startup::build_router;
use cliniclab_frontend::AppState;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "cliniclab-frontend",
        &configuration.observability.log_level,
        configuration.observability.otlp_endpoint.as_deref(),
    );

    cliniclab_frontend::services::metrics::init_metrics();

    let auth_client = Arc::new(AuthClient::new(configuration.api.clone()));
    let provider_client = Arc::new(ProviderClient::new(configuration.api.clone()));
    let state = AppState::new(auth_client, provider_client);

    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting cliniclab-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
