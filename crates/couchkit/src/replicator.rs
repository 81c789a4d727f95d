//! Persistent replication via the `_replicator` database
//!
//! A replication job is started by persisting a document and cancelled by
//! deleting it; the server observes document lifecycle and manages the job.
//! No state is tracked client-side; every query re-derives it from the
//! server.

use crate::client::Client;
use crate::error::{ensure_not_empty, Error, Result};
use crate::replication::ReplicationTarget;
use crate::types::{AllDocsResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Default replicator database name
pub const DEFAULT_REPLICATOR_DB: &str = "_replicator";

/// Reserved prefix for design documents; never surfaced by `find_all`
const DESIGN_DOC_PREFIX: &str = "_design";

/// Source of generated document ids.
///
/// Injected into the save path so tests can supply deterministic ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default id source: dash-free UUID v4
#[derive(Debug, Clone, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// User context attached to a replication document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCtx {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A document in the replicator database.
///
/// Unset fields are never serialized; the `_replication_*` fields are
/// maintained by the server and only ever deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicatorDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ReplicationTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_target: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_seq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ctx: Option<UserCtx>,
    // Replicator tuning knobs, passed through verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_processes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries_per_request: Option<u32>,
    // Server-maintained status fields
    #[serde(rename = "_replication_id", skip_serializing_if = "Option::is_none")]
    pub replication_id: Option<String>,
    #[serde(rename = "_replication_state", skip_serializing_if = "Option::is_none")]
    pub replication_state: Option<String>,
    #[serde(
        rename = "_replication_state_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub replication_state_time: Option<Value>,
}

/// Builder for replicator-database operations.
///
/// Consumed by one terminal call (`save`, `find`, `find_all`, `remove`);
/// build a fresh one per logical operation.
///
/// # Example
///
/// ```ignore
/// let response = client
///     .replicator()
///     .source("source-db")
///     .target("target-db")
///     .continuous(true)
///     .save()
///     .await?;
/// ```
pub struct Replicator {
    client: Client,
    doc: ReplicatorDocument,
    replicator_db: String,
    user_ctx_name: Option<String>,
    user_ctx_roles: Vec<String>,
    ids: Arc<dyn IdGenerator>,
}

impl Replicator {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            doc: ReplicatorDocument::default(),
            replicator_db: DEFAULT_REPLICATOR_DB.to_string(),
            user_ctx_name: None,
            user_ctx_roles: Vec::new(),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Source database name or URL
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.doc.source = Some(source.into());
        self
    }

    /// Target database name or URL
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.doc.target = Some(ReplicationTarget::Plain(target.into()));
        self
    }

    /// Keep the replication running until the document is removed
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.doc.continuous = Some(continuous);
        self
    }

    /// Filter function name, `"designdoc/filtername"`
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.doc.filter = Some(filter.into());
        self
    }

    /// Add a single parameter passed to the filter function
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.doc
            .query_params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace the full set of filter parameters
    pub fn query_params(mut self, params: Map<String, Value>) -> Self {
        self.doc.query_params = Some(params);
        self
    }

    /// Restrict replication to an explicit document-id set
    pub fn doc_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc.doc_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Route replication through an HTTP proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.doc.proxy = Some(proxy.into());
        self
    }

    /// Create the target database if it does not exist
    pub fn create_target(mut self, create_target: bool) -> Self {
        self.doc.create_target = Some(create_target);
        self
    }

    /// Resume from an update sequence (opaque checkpoint token)
    pub fn since_seq(mut self, since_seq: impl Into<String>) -> Self {
        self.doc.since_seq = Some(since_seq.into());
        self
    }

    /// Replication document id; generated at save time when unset
    pub fn doc_id(mut self, id: impl Into<String>) -> Self {
        self.doc.id = Some(id.into());
        self
    }

    /// Replication document revision; required for `remove`, optional for
    /// `find` (absent means latest)
    pub fn doc_rev(mut self, rev: impl Into<String>) -> Self {
        self.doc.rev = Some(rev.into());
        self
    }

    /// User-context name; the `user_ctx` object is assembled at save time
    /// only when a name was set
    pub fn user_ctx_name(mut self, name: impl Into<String>) -> Self {
        self.user_ctx_name = Some(name.into());
        self
    }

    /// User-context roles (default: none)
    pub fn user_ctx_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_ctx_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Number of replicator worker processes
    pub fn worker_processes(mut self, n: u32) -> Self {
        self.doc.worker_processes = Some(n);
        self
    }

    /// Documents processed per worker batch
    pub fn worker_batch_size(mut self, n: u32) -> Self {
        self.doc.worker_batch_size = Some(n);
        self
    }

    /// Maximum HTTP connections used by the job
    pub fn http_connections(mut self, n: u32) -> Self {
        self.doc.http_connections = Some(n);
        self
    }

    /// Connection timeout in milliseconds
    pub fn connection_timeout(mut self, millis: u64) -> Self {
        self.doc.connection_timeout = Some(millis);
        self
    }

    /// Retries per failed request
    pub fn retries_per_request(mut self, n: u32) -> Self {
        self.doc.retries_per_request = Some(n);
        self
    }

    /// Use a replicator database other than `_replicator` for all
    /// subsequent operations on this builder
    pub fn replicator_db(mut self, name: impl Into<String>) -> Self {
        self.replicator_db = name.into();
        self
    }

    /// Replace the id source used when no document id was set
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Persist the replication document, starting the job.
    ///
    /// The id defaults to a generated identifier when unset; a user context
    /// is attached only if a name was configured.
    pub async fn save(mut self) -> Result<Response> {
        ensure_not_empty(self.doc.source.as_deref(), "source")?;
        ensure_not_empty(
            self.doc.target.as_ref().map(ReplicationTarget::url),
            "target",
        )?;
        if let Some(name) = self.user_ctx_name.take() {
            self.doc.user_ctx = Some(UserCtx {
                name,
                roles: std::mem::take(&mut self.user_ctx_roles),
            });
        }
        let id = match self.doc.id.take().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.ids.generate(),
        };
        debug!(db = %self.replicator_db, id = %id, "saving replicator document");
        let url = self.client.url(&[&self.replicator_db, &id])?;
        self.doc.id = Some(id);
        self.client.put_json(url, &self.doc).await
    }

    /// Fetch a replication document by id; a set revision pins that
    /// revision, otherwise the latest is returned
    pub async fn find(self) -> Result<ReplicatorDocument> {
        ensure_not_empty(self.doc.id.as_deref(), "document id")?;
        let id = self.doc.id.unwrap_or_default();
        let mut url = self.client.url(&[&self.replicator_db, &id])?;
        if let Some(rev) = self.doc.rev.as_deref().filter(|r| !r.is_empty()) {
            url.query_pairs_mut().append_pair("rev", rev);
        }
        self.client.get_json(url).await
    }

    /// List all replication documents, skipping design documents
    pub async fn find_all(self) -> Result<Vec<ReplicatorDocument>> {
        let mut url = self.client.url(&[&self.replicator_db, "_all_docs"])?;
        url.query_pairs_mut().append_pair("include_docs", "true");
        let resp: AllDocsResponse = self.client.get_json(url).await?;
        let mut docs = Vec::with_capacity(resp.rows.len());
        for row in resp.rows {
            if row.id.starts_with(DESIGN_DOC_PREFIX) {
                continue;
            }
            if let Some(doc) = row.doc {
                let doc = serde_json::from_value(doc)
                    .map_err(|e| Error::Json(format!("failed to decode replicator doc: {e}")))?;
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Delete the replication document, stopping the job.
    ///
    /// Requires both id and revision; a revision mismatch surfaces as
    /// [`Error::Conflict`].
    pub async fn remove(self) -> Result<Response> {
        ensure_not_empty(self.doc.id.as_deref(), "document id")?;
        ensure_not_empty(self.doc.rev.as_deref(), "document revision")?;
        let id = self.doc.id.unwrap_or_default();
        let rev = self.doc.rev.unwrap_or_default();
        debug!(db = %self.replicator_db, id = %id, "removing replicator document");
        let mut url = self.client.url(&[&self.replicator_db, &id])?;
        url.query_pairs_mut().append_pair("rev", &rev);
        self.client.delete_json(url).await
    }
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("replicator_db", &self.replicator_db)
            .field("doc", &self.doc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;

    fn builder() -> Replicator {
        Client::new(ClientConfig::new("http://localhost:5984"))
            .unwrap()
            .replicator()
    }

    #[test]
    fn test_document_omits_unset_fields() {
        let doc = ReplicatorDocument {
            source: Some("a".into()),
            target: Some(ReplicationTarget::Plain("b".into())),
            ..Default::default()
        };
        let value = serde_json::to_value(&doc).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["source"], "a");
        assert_eq!(obj["target"], "b");
    }

    #[test]
    fn test_document_round_trip() {
        let doc = ReplicatorDocument {
            id: Some("repl-1".into()),
            source: Some("a".into()),
            target: Some(ReplicationTarget::Plain("b".into())),
            continuous: Some(true),
            worker_batch_size: Some(500),
            ..Default::default()
        };
        let json = serde_json::to_string(&doc).unwrap();
        let back: ReplicatorDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
        assert!(back.filter.is_none());
        assert!(back.user_ctx.is_none());
    }

    #[test]
    fn test_document_deserializes_server_fields() {
        let doc: ReplicatorDocument = serde_json::from_value(json!({
            "_id": "repl-1",
            "_rev": "2-def",
            "source": "a",
            "target": "b",
            "_replication_id": "8f5b1bd0",
            "_replication_state": "triggered",
            "_replication_state_time": "2026-08-29T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(doc.replication_state.as_deref(), Some("triggered"));
        assert_eq!(doc.replication_id.as_deref(), Some("8f5b1bd0"));
        // Server-maintained fields must not be echoed back unset.
        let value = serde_json::to_value(ReplicatorDocument::default()).unwrap();
        assert!(value.get("_replication_state").is_none());
    }

    #[test]
    fn test_uuid_generator_shape() {
        let id = UuidGenerator.generate();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
        assert_ne!(id, UuidGenerator.generate());
    }

    #[tokio::test]
    async fn test_save_requires_source_and_target() {
        let err = builder().target("b").save().await.unwrap_err();
        assert!(err.is_validation());

        let err = builder().source("a").save().await.unwrap_err();
        assert!(err.is_validation());

        let err = builder().source("a").target("").save().await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_find_requires_id() {
        assert!(builder().find().await.unwrap_err().is_validation());
        assert!(builder().doc_id("").find().await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_remove_requires_id_and_rev() {
        let err = builder().doc_rev("1-abc").remove().await.unwrap_err();
        assert!(err.is_validation());

        let err = builder().doc_id("repl-1").remove().await.unwrap_err();
        assert!(err.is_validation());
    }
}
