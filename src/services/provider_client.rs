use reqwest::Client;
use serde::Serialize;

use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::provider::Provider;

/// Thin client for the booking API's public provider search. Filtering and
/// ordering are entirely server-side concerns; this only forwards the query
/// and decodes the result list.
pub struct ProviderClient {
    client: Client,
    settings: ApiSettings,
}

#[derive(Debug, Default, Serialize)]
struct SearchParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    wilaya: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
}

impl ProviderClient {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub async fn search(
        &self,
        wilaya: Option<&str>,
        service: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Vec<Provider>, ApiError> {
        let params = SearchParams {
            wilaya,
            service,
            sort,
        };
        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| ApiError::Malformed(e.to_string()))?;
        let url = format!("{}/providers/search?{}", self.settings.base_url, query);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "provider search request failed");
            ApiError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let payload: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(ApiError::rejection(status, payload));
        }
        response
            .json::<Vec<Provider>>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }
}
