//! HTTP client for the CMS content API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use content_indexer_shared::{IncludedPath, IndexDefinition, ItemToIndex};

use crate::content::{ContentSource, UrlResolver};
use crate::errors::IndexerError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Body of `POST {base}/items`.
#[derive(Debug, Serialize)]
struct ItemsQuery<'a> {
    channel_name: &'a str,
    languages: &'a [String],
    included_paths: &'a [IncludedPath],
    included_reusable_content_types: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UrlResponse {
    url: String,
}

/// Production content client that talks to the CMS API.
///
/// # Example
///
/// ```ignore
/// use content_indexer::content::{ContentSource, HttpContentClient};
///
/// let client = HttpContentClient::new("http://localhost:5000/api/search")?;
/// let items = client.query_items(&definition).await?;
/// ```
pub struct HttpContentClient {
    url: String,
    client: ReqwestClient,
}

impl HttpContentClient {
    pub fn new(url: &str) -> Result<Self, IndexerError> {
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IndexerError::content(e.to_string()))?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ContentSource for HttpContentClient {
    #[instrument(skip(self, definition), fields(index = %definition.index_name))]
    async fn query_items(
        &self,
        definition: &IndexDefinition,
    ) -> Result<Vec<ItemToIndex>, IndexerError> {
        let query = ItemsQuery {
            channel_name: &definition.channel_name,
            languages: &definition.languages,
            included_paths: &definition.included_paths,
            included_reusable_content_types: &definition.included_reusable_content_types,
        };

        let response = self
            .client
            .post(format!("{}/items", self.url))
            .json(&query)
            .send()
            .await
            .map_err(|e| IndexerError::content(e.to_string()))?
            .error_for_status()
            .map_err(|e| IndexerError::content(e.to_string()))?;

        let items: Vec<ItemToIndex> = response
            .json()
            .await
            .map_err(|e| IndexerError::parse(format!("Invalid items response: {}", e)))?;

        // The CMS filters coarsely; apply the exact inclusion rules here.
        let total = items.len();
        let items: Vec<ItemToIndex> = items
            .into_iter()
            .filter(|item| definition.includes(item))
            .collect();
        debug!(returned = total, included = items.len(), "Queried content items");
        Ok(items)
    }
}

#[async_trait]
impl UrlResolver for HttpContentClient {
    async fn resolve_url(
        &self,
        tree_path: &str,
        channel_name: &str,
        language_name: &str,
    ) -> Result<String, IndexerError> {
        let response = self
            .client
            .get(format!("{}/url", self.url))
            .query(&[
                ("path", tree_path),
                ("channel", channel_name),
                ("language", language_name),
            ])
            .send()
            .await
            .map_err(|e| IndexerError::content(e.to_string()))?
            .error_for_status()
            .map_err(|e| IndexerError::content(e.to_string()))?;

        let body: UrlResponse = response
            .json()
            .await
            .map_err(|e| IndexerError::parse(format!("Invalid url response: {}", e)))?;
        Ok(body.url)
    }
}
