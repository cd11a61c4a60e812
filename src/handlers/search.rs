use askama::Template;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::models::provider::Provider;
use crate::AppState;

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub wilaya: String,
    pub service: String,
    pub sort: String,
    pub providers: Vec<Provider>,
    pub error: String,
    pub has_error: bool,
    pub show_empty: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub wilaya: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub sort: String,
}

/// Provider search page. The filter itself lives in the booking API; this
/// handler forwards the query and renders whatever comes back.
pub async fn search_page(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    fn non_empty(s: &String) -> Option<&str> {
        if s.is_empty() {
            None
        } else {
            Some(s.as_str())
        }
    }

    let (providers, error) = match state
        .provider_client
        .search(
            non_empty(&query.wilaya),
            non_empty(&query.service),
            non_empty(&query.sort),
        )
        .await
    {
        Ok(providers) => (providers, String::new()),
        Err(err) => {
            tracing::error!(error = %err, "provider search failed");
            (Vec::new(), err.user_message())
        }
    };

    SearchTemplate {
        wilaya: query.wilaya,
        service: query.service,
        sort: query.sort,
        has_error: !error.is_empty(),
        show_empty: providers.is_empty() && error.is_empty(),
        error,
        providers,
    }
}
