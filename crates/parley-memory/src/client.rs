use crate::error::MemoryError;
use parley_types::MemoryRecord;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Timeout for a memory store round trip.
const MEMORY_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the external vector index.
#[derive(Clone)]
pub struct MemoryClient {
    base_url: String,
    api_key: String,
    index: String,
    dimension: usize,
    client: reqwest::Client,
}

impl fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("index", &self.index)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl MemoryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        index: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, MemoryError> {
        if dimension == 0 {
            return Err(MemoryError::Config(
                "memory index dimension must be non-zero".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(MEMORY_TIMEOUT)
            .build()
            .map_err(|e| MemoryError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            index: index.into(),
            dimension,
            client,
        })
    }

    /// Upserts a record into `namespace`. The store embeds the record's
    /// `text` field itself; no vector is supplied here.
    pub async fn upsert(&self, namespace: &str, record: &MemoryRecord) -> Result<(), MemoryError> {
        let url = format!(
            "{}/indexes/{}/namespaces/{}/records",
            self.base_url.trim_end_matches('/'),
            self.index,
            namespace
        );
        let res = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&json!({ "records": [record] }))
            .send()
            .await?;
        Self::check(res).await?;
        tracing::debug!(record_id = %record.id, namespace, "memory record upserted");
        Ok(())
    }

    /// Similarity search by query text, scoped to `owner`. Returns the text
    /// field of each hit in rank order.
    pub async fn search_text(
        &self,
        namespace: &str,
        owner: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, MemoryError> {
        let url = format!(
            "{}/indexes/{}/namespaces/{}/search",
            self.base_url.trim_end_matches('/'),
            self.index,
            namespace
        );
        let res = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&search_body(query, owner, top_k))
            .send()
            .await?;
        let json: Value = Self::check(res).await?.json().await?;
        Ok(extract_texts(&json, &["fields", "text"]))
    }

    /// Filter-only listing: a zero query vector with an owner equality
    /// filter, full metadata requested. There is no meaningful similarity
    /// ranking on this path.
    pub async fn list_by_owner(
        &self,
        namespace: &str,
        owner: &str,
        top_k: usize,
    ) -> Result<Vec<String>, MemoryError> {
        let url = format!(
            "{}/indexes/{}/query",
            self.base_url.trim_end_matches('/'),
            self.index
        );
        let res = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&query_body(namespace, owner, top_k, self.dimension))
            .send()
            .await?;
        let json: Value = Self::check(res).await?.json().await?;
        Ok(extract_texts(&json, &["metadata", "text"]))
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, MemoryError> {
        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(MemoryError::Api { status, body })
        }
    }
}

fn search_body(query: &str, owner: &str, top_k: usize) -> Value {
    json!({
        "query": { "text": query, "top_k": top_k },
        "filter": { "owner": { "$eq": owner } },
        "fields": ["text"],
    })
}

fn query_body(namespace: &str, owner: &str, top_k: usize, dimension: usize) -> Value {
    json!({
        "namespace": namespace,
        "vector": vec![0.0f32; dimension],
        "top_k": top_k,
        "filter": { "owner": { "$eq": owner } },
        "include_metadata": true,
    })
}

/// Pulls the text payload out of each match, following `path` into the
/// match object. Matches without a text payload are skipped.
fn extract_texts(response: &Value, path: &[&str]) -> Vec<String> {
    response
        .get("matches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .filter_map(|hit| {
                    let mut node = hit;
                    for key in path {
                        node = node.get(*key)?;
                    }
                    node.as_str().map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_body_uses_zero_vector_of_index_dimension() {
        let body = query_body("user-memories", "user-1", 5, 8);
        let vector = body["vector"].as_array().unwrap();
        assert_eq!(vector.len(), 8);
        assert!(vector.iter().all(|v| v.as_f64() == Some(0.0)));
        assert_eq!(body["filter"]["owner"]["$eq"], "user-1");
        assert_eq!(body["include_metadata"], true);
    }

    #[test]
    fn search_body_requests_text_field_only() {
        let body = search_body("what did I say", "user-1", 5);
        assert_eq!(body["query"]["text"], "what did I say");
        assert_eq!(body["query"]["top_k"], 5);
        assert_eq!(body["fields"][0], "text");
    }

    #[test]
    fn extract_texts_skips_malformed_hits() {
        let response = json!({
            "matches": [
                { "metadata": { "text": "first" } },
                { "metadata": {} },
                { "metadata": { "text": "second" } },
            ]
        });
        assert_eq!(
            extract_texts(&response, &["metadata", "text"]),
            vec!["first", "second"]
        );
        assert!(extract_texts(&json!({}), &["metadata", "text"]).is_empty());
    }

    #[test]
    fn zero_dimension_is_a_config_error() {
        let err = MemoryClient::new("http://localhost:0", "key", "parley", 0).unwrap_err();
        assert!(matches!(err, MemoryError::Config(_)));
    }
}
