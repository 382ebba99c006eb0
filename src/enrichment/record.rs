use serde::{Deserialize, Deserializer, Serialize};

/// Link metrics for one target, as returned by the URL metrics endpoint.
///
/// Missing text fields become empty strings and missing numbers become `None`,
/// so a sparse result never fails the whole chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub page: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub subdomain: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub root_domain: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub last_crawled: String,
    #[serde(default)]
    pub http_code: Option<i32>,
    #[serde(default)]
    pub pages_to_page: Option<i64>,
    #[serde(default)]
    pub nofollow_pages_to_page: Option<i64>,
    #[serde(default)]
    pub redirect_pages_to_page: Option<i64>,
    #[serde(default)]
    pub external_pages_to_page: Option<i64>,
    #[serde(default)]
    pub spam_score: Option<i32>,
    #[serde(default)]
    pub page_authority: Option<i32>,
    #[serde(default)]
    pub domain_authority: Option<i32>,
    #[serde(default)]
    pub link_propensity: Option<f64>,
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a successful URL metrics response
#[derive(Debug, Deserialize)]
pub struct UrlMetricsResponse {
    pub results: Vec<MetricsRecord>,
}

/// Parse a successful response body into its raw JSON and the records it carries
pub fn parse_results(body: &str) -> Result<(serde_json::Value, Vec<MetricsRecord>), String> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| format!("response is not JSON: {}", e))?;
    let parsed: UrlMetricsResponse = serde_json::from_value(payload.clone())
        .map_err(|e| format!("unexpected results shape: {}", e))?;
    Ok((payload, parsed.results))
}
