//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchEngine`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesGetAliasParts, IndicesGetParts},
    BulkOperation, BulkParts, CountParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use content_indexer_shared::{IndexSchema, SearchDocument};

use crate::errors::SearchEngineError;
use crate::interfaces::SearchEngine;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::types::{BatchOperationResult, BatchOperationSummary};

/// Request timeout for every call to the cluster.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenSearch provider implementation.
///
/// Document writes go through the `_bulk` API; alias swaps go through a
/// single `_aliases` request so the remove and the add are applied together.
///
/// # Example
///
/// ```ignore
/// use content_indexer_repository::opensearch::{IndexConfig, OpenSearchProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// provider.create_index("articles_v1", &IndexSchema::base()).await?;
/// provider.swap_alias("articles", None, "articles_v1").await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - Shard and replica settings for created indices
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchEngineError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchEngineError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchEngineError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SearchEngineError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            shards = index_config.number_of_shards,
            replicas = index_config.number_of_replicas,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Check the cluster is reachable.
    pub async fn ping(&self) -> Result<(), SearchEngineError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchEngineError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(SearchEngineError::connection(format!(
                "Ping failed with status {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn error_body(response: Response) -> String {
        response.text().await.unwrap_or_default()
    }

    async fn send_bulk(
        &self,
        index_name: &str,
        ids: Vec<String>,
        operations: Vec<BulkOperation<Value>>,
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        let response = self
            .client
            .bulk(BulkParts::Index(index_name))
            .body(operations)
            .send()
            .await
            .map_err(|e| SearchEngineError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(index = %index_name, status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchEngineError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchEngineError::parse(e.to_string()))?;

        parse_bulk_response(&ids, &body)
    }
}

/// Turn a `_bulk` response into per-document results.
///
/// Items are matched to `ids` by position. A delete answered with `404`
/// (`not_found`) counts as a success.
fn parse_bulk_response(
    ids: &[String],
    body: &Value,
) -> Result<BatchOperationSummary, SearchEngineError> {
    let items = body["items"]
        .as_array()
        .ok_or_else(|| SearchEngineError::parse("Bulk response has no items array"))?;

    if items.len() != ids.len() {
        return Err(SearchEngineError::parse(format!(
            "Bulk response has {} items for {} operations",
            items.len(),
            ids.len()
        )));
    }

    let results = ids
        .iter()
        .zip(items)
        .map(|(id, item)| {
            let (action, outcome) = match item.as_object().and_then(|o| o.iter().next()) {
                Some(entry) => entry,
                None => {
                    return BatchOperationResult::failed(
                        id.clone(),
                        SearchEngineError::parse("Malformed bulk item"),
                    )
                }
            };
            let status = outcome["status"].as_u64().unwrap_or(0);
            let is_missing_delete = action == "delete" && status == 404;

            if (200..300).contains(&status) || is_missing_delete {
                BatchOperationResult::succeeded(id.clone())
            } else {
                let reason = outcome["error"]["reason"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| outcome["error"].to_string());
                let error = if action == "delete" {
                    SearchEngineError::delete(format!("status {}: {}", status, reason))
                } else {
                    SearchEngineError::bulk_index(format!("status {}: {}", status, reason))
                };
                BatchOperationResult::failed(id.clone(), error)
            }
        })
        .collect();

    Ok(BatchOperationSummary::from_results(results))
}

/// Find which index an alias points at in a `GET _alias/{name}` response.
fn alias_target(body: &Value, alias: &str) -> Option<String> {
    body.as_object()?
        .iter()
        .find(|(_, entry)| entry["aliases"].get(alias).is_some())
        .map(|(index, _)| index.clone())
}

/// The `_aliases` body that moves `alias` from `from` to `to` in one request.
fn alias_actions(alias: &str, from: Option<&str>, to: &str) -> Value {
    let mut actions = Vec::with_capacity(2);
    if let Some(from) = from {
        actions.push(json!({ "remove": { "index": from, "alias": alias } }));
    }
    actions.push(json!({ "add": { "index": to, "alias": alias } }));
    json!({ "actions": actions })
}

#[async_trait]
impl SearchEngine for OpenSearchProvider {
    #[instrument(skip(self, schema), fields(fields = schema.len()))]
    async fn create_index(
        &self,
        physical_name: &str,
        schema: &IndexSchema,
    ) -> Result<(), SearchEngineError> {
        let body = get_index_settings(schema, &self.index_config);

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(physical_name))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchEngineError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(status = %status, body = %error_body, "Create index request failed");
            return Err(SearchEngineError::index_creation(format!(
                "Create index '{}' failed with status {}: {}",
                physical_name, status, error_body
            )));
        }

        info!(index = %physical_name, "Created index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, physical_name: &str) -> Result<(), SearchEngineError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[physical_name]))
            .send()
            .await
            .map_err(|e| SearchEngineError::index_deletion(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - index may already be gone
        if status.as_u16() == 404 {
            debug!(index = %physical_name, "Index already absent");
            return Ok(());
        }
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(status = %status, body = %error_body, "Delete index request failed");
            return Err(SearchEngineError::index_deletion(format!(
                "Delete index '{}' failed with status {}: {}",
                physical_name, status, error_body
            )));
        }

        info!(index = %physical_name, "Deleted index");
        Ok(())
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut operations: Vec<BulkOperation<Value>> = Vec::with_capacity(documents.len());
        for document in documents {
            let source = document
                .to_source()
                .map_err(|e| SearchEngineError::serialization(e.to_string()))?;
            ids.push(document.object_id.clone());
            operations.push(
                BulkOperation::index(source)
                    .id(document.object_id.as_str())
                    .into(),
            );
        }

        let summary = self.send_bulk(index_name, ids, operations).await?;
        if summary.failed > 0 {
            warn!(
                index = %index_name,
                failed = summary.failed,
                total = summary.total,
                "Some documents were not indexed"
            );
        }
        debug!(index = %index_name, succeeded = summary.succeeded, "Upserted documents");
        Ok(summary)
    }

    #[instrument(skip(self, object_ids), fields(count = object_ids.len()))]
    async fn delete_documents(
        &self,
        index_name: &str,
        object_ids: &[String],
    ) -> Result<BatchOperationSummary, SearchEngineError> {
        if object_ids.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let operations: Vec<BulkOperation<Value>> = object_ids
            .iter()
            .map(|id| BulkOperation::delete(id.as_str()).into())
            .collect();

        let summary = self
            .send_bulk(index_name, object_ids.to_vec(), operations)
            .await?;
        debug!(index = %index_name, succeeded = summary.succeeded, "Deleted documents");
        Ok(summary)
    }

    async fn document_count(&self, index_name: &str) -> Result<u64, SearchEngineError> {
        let response = self
            .client
            .count(CountParts::Index(&[index_name]))
            .send()
            .await
            .map_err(|e| SearchEngineError::count(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(0);
        }
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            return Err(SearchEngineError::count(format!(
                "Count on '{}' failed with status {}: {}",
                index_name, status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchEngineError::parse(e.to_string()))?;
        body["count"]
            .as_u64()
            .ok_or_else(|| SearchEngineError::parse("Count response has no count"))
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, SearchEngineError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchEngineError::alias(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            return Err(SearchEngineError::alias(format!(
                "Get alias '{}' failed with status {}: {}",
                alias, status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchEngineError::parse(e.to_string()))?;
        Ok(alias_target(&body, alias))
    }

    async fn is_physical_index(&self, name: &str) -> Result<bool, SearchEngineError> {
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchEngineError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(false);
        }
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            return Err(SearchEngineError::connection(format!(
                "Get index '{}' failed with status {}: {}",
                name, status, error_body
            )));
        }

        // An alias resolves to its physical indices, keyed by their own names.
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchEngineError::parse(e.to_string()))?;
        Ok(body.get(name).is_some())
    }

    #[instrument(skip(self))]
    async fn swap_alias(
        &self,
        alias: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<(), SearchEngineError> {
        let response = self
            .client
            .indices()
            .update_aliases()
            .body(alias_actions(alias, from, to))
            .send()
            .await
            .map_err(|e| SearchEngineError::alias(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(status = %status, body = %error_body, "Alias update failed");
            return Err(SearchEngineError::alias(format!(
                "Moving alias '{}' to '{}' failed with status {}: {}",
                alias, to, status, error_body
            )));
        }

        info!(alias = %alias, from = ?from, to = %to, "Swapped alias");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_bulk_response_all_succeeded() {
        let body = json!({
            "errors": false,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 200 } }
            ]
        });

        let summary = parse_bulk_response(&ids(&["a", "b"]), &body).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_parse_bulk_response_partial_failure() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [order]"
                } } }
            ]
        });

        let summary = parse_bulk_response(&ids(&["a", "b"]), &body).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.document_id, "b");
        match &failure.error {
            Some(SearchEngineError::BulkIndexError(msg)) => {
                assert!(msg.contains("failed to parse field [order]"))
            }
            other => panic!("Expected BulkIndexError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bulk_response_missing_delete_is_success() {
        let body = json!({
            "items": [
                { "delete": { "_id": "gone", "status": 404, "result": "not_found" } },
                { "delete": { "_id": "x", "status": 429, "error": { "reason": "too many requests" } } }
            ]
        });

        let summary = parse_bulk_response(&ids(&["gone", "x"]), &body).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(matches!(
            summary.results[1].error,
            Some(SearchEngineError::DeleteError(_))
        ));
    }

    #[test]
    fn test_parse_bulk_response_length_mismatch() {
        let body = json!({ "items": [ { "index": { "status": 201 } } ] });
        assert!(matches!(
            parse_bulk_response(&ids(&["a", "b"]), &body),
            Err(SearchEngineError::ParseError(_))
        ));
        assert!(matches!(
            parse_bulk_response(&ids(&["a"]), &json!({})),
            Err(SearchEngineError::ParseError(_))
        ));
    }

    #[test]
    fn test_alias_actions_swap() {
        let body = alias_actions("articles", Some("articles_v1"), "articles_v2");
        assert_eq!(
            body,
            json!({
                "actions": [
                    { "remove": { "index": "articles_v1", "alias": "articles" } },
                    { "add": { "index": "articles_v2", "alias": "articles" } }
                ]
            })
        );
    }

    #[test]
    fn test_alias_actions_first_build() {
        let body = alias_actions("articles", None, "articles_v1");
        assert_eq!(body["actions"].as_array().unwrap().len(), 1);
        assert_eq!(body["actions"][0]["add"]["index"], "articles_v1");
    }

    #[test]
    fn test_alias_target() {
        let body = json!({
            "articles_v7": { "aliases": { "articles": {} } },
            "other_v1": { "aliases": { "other": {} } }
        });
        assert_eq!(alias_target(&body, "articles").as_deref(), Some("articles_v7"));
        assert_eq!(alias_target(&body, "missing"), None);
    }
}
