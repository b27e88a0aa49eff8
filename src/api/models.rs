use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct CompareRequest {
    pub urls: Option<Vec<String>>,
    #[serde(default, alias = "userContext")]
    pub context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub min_budget: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub max_budget: String,
    #[serde(default)]
    pub main_use: Option<String>,
    #[serde(default, alias = "userNeeds")]
    pub specific_needs: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub analyzer: String,
    pub environment: &'static str,
    pub started_at: DateTime<Utc>,
}

/// Budgets arrive from form inputs as strings, but API callers send numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => text,
        Some(Raw::Number(number)) => number.to_string(),
        None => String::new(),
    })
}
