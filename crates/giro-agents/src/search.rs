//! HTTP retriever over the semantic search service.

use async_trait::async_trait;
use giro_core::{
    config::RetrievalConfig,
    error::GiroError,
    filter::Filter,
    traits::{Retriever, SearchHit},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    filter: &'a Filter,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    item_id: i64,
    score: f32,
}

/// Retriever backed by the vector search service's HTTP API.
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRetriever {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(
        &self,
        query: &str,
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, GiroError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let body = SearchRequest {
            query,
            filter,
            top_k,
        };

        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.header("api-key", &self.api_key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GiroError::Agent(format!("search request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GiroError::Agent(format!(
                "search returned {status}: {text}"
            )));
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| GiroError::Agent(format!("failed to parse search response: {e}")))?;

        debug!("search '{query}' returned {} hits", parsed.hits.len());
        Ok(parsed
            .hits
            .into_iter()
            .map(|h| SearchHit {
                item_id: h.item_id,
                score: h.score,
            })
            .collect())
    }
}
