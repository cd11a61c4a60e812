use serde::{Deserialize, Serialize};

/// A clinic or lab row as returned by the booking API's search endpoint.
/// Search and sorting happen server-side; this front-end only renders the
/// results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub wilaya: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default, rename = "reviewsCount")]
    pub reviews_count: i64,
    #[serde(default, rename = "openHours")]
    pub open_hours: String,
}
