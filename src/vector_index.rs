//! Minimal client for the vector index data plane.
//!
//! Only the calls teardown needs: query ids by metadata filter, delete by id,
//! and delete everything in a namespace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on ids per delete request accepted by the index.
pub const MAX_IDS_PER_DELETE: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("Vector index is not configured")]
    Unconfigured,
    #[error("Invalid index host: {0}")]
    InvalidHost(#[from] url::ParseError),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Equality match on a single metadata field.
#[derive(Debug, Clone, Copy)]
pub struct MetadataFilter<'a> {
    pub field: &'a str,
    pub value: &'a str,
}

impl MetadataFilter<'_> {
    pub fn to_json(&self) -> Value {
        let mut filter = serde_json::Map::new();
        filter.insert(self.field.to_string(), json!({ "$eq": self.value }));
        Value::Object(filter)
    }
}

/// `None` is the default (unnamespaced) space.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query_ids(
        &self,
        namespace: Option<&str>,
        filter: MetadataFilter<'_>,
        top_k: u32,
    ) -> Result<Vec<String>, VectorIndexError>;

    async fn delete_ids(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<(), VectorIndexError>;

    async fn delete_all(&self, namespace: &str) -> Result<(), VectorIndexError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: u32,
    filter: Value,
    namespace: &'a str,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
    namespace: &'a str,
}

/// Pinecone-style index client with reusable HTTP client and stored API key
#[derive(Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    host: Url,
    api_key: Arc<String>,
    dimension: usize,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: String, dimension: usize) -> Result<Self, VectorIndexError> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let host = Url::parse(&format!("{}/", host.trim_end_matches('/')))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(16)
            .user_agent("sitechat/vector-index-client")
            .build()?;

        Ok(Self {
            client,
            host,
            api_key: Arc::new(api_key),
            dimension,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<reqwest::Response, VectorIndexError> {
        let url = self.host.join(path)?;
        let response = self
            .client
            .post(url)
            .header("Api-Key", self.api_key.as_str())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn error_from(response: reqwest::Response) -> VectorIndexError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        VectorIndexError::Api { status, message }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query_ids(
        &self,
        namespace: Option<&str>,
        filter: MetadataFilter<'_>,
        top_k: u32,
    ) -> Result<Vec<String>, VectorIndexError> {
        // Filter-only lookups still need a query vector of the index dimension.
        let request = QueryRequest {
            vector: vec![0.0; self.dimension],
            top_k,
            filter: filter.to_json(),
            namespace: namespace.unwrap_or(""),
            include_values: false,
            include_metadata: false,
        };

        let response = self.post("query", &request).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response.json::<QueryResponse>().await?;
        debug!("Vector query matched {} ids", body.matches.len());
        Ok(body.matches.into_iter().map(|m| m.id).collect())
    }

    async fn delete_ids(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<(), VectorIndexError> {
        for chunk in ids.chunks(MAX_IDS_PER_DELETE) {
            let request = DeleteRequest {
                ids: Some(chunk),
                delete_all: false,
                namespace: namespace.unwrap_or(""),
            };
            let response = self.post("vectors/delete", &request).await?;
            if !response.status().is_success() {
                return Err(Self::error_from(response).await);
            }
        }
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> Result<(), VectorIndexError> {
        let request = DeleteRequest {
            ids: None,
            delete_all: true,
            namespace,
        };
        let response = self.post("vectors/delete", &request).await?;

        // A namespace that was never written (or already cleared) is reported as 404.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Namespace not found in vector index, treating as already cleared");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

/// Stand-in used when no index host is configured. Every call fails, so a
/// website that does have a vector config is never reported as cleaned.
#[derive(Debug, Clone, Default)]
pub struct DisabledIndex;

#[async_trait]
impl VectorIndex for DisabledIndex {
    async fn query_ids(
        &self,
        _namespace: Option<&str>,
        _filter: MetadataFilter<'_>,
        _top_k: u32,
    ) -> Result<Vec<String>, VectorIndexError> {
        Err(VectorIndexError::Unconfigured)
    }

    async fn delete_ids(
        &self,
        _namespace: Option<&str>,
        _ids: &[String],
    ) -> Result<(), VectorIndexError> {
        Err(VectorIndexError::Unconfigured)
    }

    async fn delete_all(&self, _namespace: &str) -> Result<(), VectorIndexError> {
        Err(VectorIndexError::Unconfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_filter_json() {
        let filter = MetadataFilter {
            field: "websiteId",
            value: "abc",
        };
        assert_eq!(filter.to_json(), json!({ "websiteId": { "$eq": "abc" } }));
    }

    #[test]
    fn test_delete_request_shapes() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let by_id = DeleteRequest {
            ids: Some(ids.as_slice()),
            delete_all: false,
            namespace: "",
        };
        assert_eq!(
            serde_json::to_value(&by_id).unwrap(),
            json!({ "ids": ["a", "b"], "namespace": "" })
        );

        let all = DeleteRequest {
            ids: None,
            delete_all: true,
            namespace: "tenant",
        };
        assert_eq!(
            serde_json::to_value(&all).unwrap(),
            json!({ "deleteAll": true, "namespace": "tenant" })
        );
    }

    #[test]
    fn test_host_normalization() {
        let index = PineconeIndex::new("my-index.svc.pinecone.io", "key".to_string(), 8).unwrap();
        assert_eq!(index.host.as_str(), "https://my-index.svc.pinecone.io/");
        assert_eq!(
            index.host.join("vectors/delete").unwrap().as_str(),
            "https://my-index.svc.pinecone.io/vectors/delete"
        );

        let index = PineconeIndex::new("http://localhost:5080/", "key".to_string(), 8).unwrap();
        assert_eq!(index.host.as_str(), "http://localhost:5080/");
    }

    #[tokio::test]
    async fn test_disabled_index_rejects_calls() {
        let index = DisabledIndex;
        assert!(matches!(
            index.delete_all("ns").await,
            Err(VectorIndexError::Unconfigured)
        ));
    }
}
