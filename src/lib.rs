pub mod config;
pub mod error;
pub mod flows;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod session;
pub mod startup;

use services::{auth_client::AuthClient, provider_client::ProviderClient};
use std::sync::Arc;

/// Shared application state containing service clients
#[derive(Clone)]
pub struct AppState {
    pub auth_client: Arc<AuthClient>,
    pub provider_client: Arc<ProviderClient>,
}

impl AppState {
    pub fn new(auth_client: Arc<AuthClient>, provider_client: Arc<ProviderClient>) -> Self {
        Self {
            auth_client,
            provider_client,
        }
    }
}
