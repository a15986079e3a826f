//! HTTP client for the remote book catalog.
//!
//! The catalog service exposes a single search endpoint:
//!
//! ```text
//! POST {endpoint}/search
//! Authorization: <token>
//! Content-Type: application/json
//!
//! {"query": "...", "maxResults": 20}
//! ```
//!
//! The response body is a JSON envelope with a `books` key. Decoding of that
//! envelope (including the service's error-object convention) lives in
//! [`frankenshelf_core::catalog::parse_search_body`]; this module only moves
//! bytes and maps transport failures onto [`CatalogError`].

use std::time::Duration;

use frankenshelf_core::catalog::{CatalogClient, LookupFuture, parse_search_body};
use frankenshelf_core::config::CatalogConfig;
use frankenshelf_core::error::CatalogError;
use tracing::debug;

/// A [`CatalogClient`] backed by `reqwest`.
///
/// Cheap to clone pieces are copied into each lookup future so the futures
/// stay `'static` and can outlive the client borrow that created them.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    max_results: u32,
}

impl HttpCatalogClient {
    /// Builds a client from the catalog section of the config.
    ///
    /// The request timeout covers the whole exchange, connect included. A
    /// trailing slash on the endpoint is tolerated so both
    /// `https://host` and `https://host/` produce `https://host/search`.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            max_results: config.max_results,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.endpoint)
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        serde_json::json!({ "query": query, "maxResults": self.max_results })
    }
}

impl CatalogClient for HttpCatalogClient {
    fn search(&self, query: &str) -> LookupFuture {
        let client = self.client.clone();
        let url = self.search_url();
        let token = self.token.clone();
        let body = self.request_body(query);
        let query = query.to_string();
        Box::pin(async move {
            debug!(query = %query, url = %url, "catalog lookup");
            let response = client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, token)
                .json(&body)
                .send()
                .await
                .map_err(|e| CatalogError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                debug!(query = %query, status = status.as_u16(), "catalog returned error status");
                return Err(CatalogError::Status(status.as_u16()));
            }
            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| CatalogError::Malformed(e.to_string()))?;
            parse_search_body(&value)
        })
    }
}
