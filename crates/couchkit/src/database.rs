//! Database handle: metadata, maintenance, and document CRUD

use crate::client::Client;
use crate::error::{ensure_not_empty, Error, Result};
use crate::types::{CouchDbInfo, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Handle for operations scoped to a single database.
///
/// Obtained from [`Client::database`]; holds no server-side state.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    name: String,
}

impl Database {
    pub(crate) fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// The database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database metadata (`GET /{db}`)
    pub async fn info(&self) -> Result<CouchDbInfo> {
        self.client.get_json(self.client.url(&[&self.name])?).await
    }

    /// Trigger a compaction run (`POST /{db}/_compact`)
    pub async fn compact(&self) -> Result<()> {
        let url = self.client.url(&[&self.name, "_compact"])?;
        let _: Response = self.client.post_empty(url).await?;
        Ok(())
    }

    /// Ask the server to commit recent changes to disk
    pub async fn ensure_full_commit(&self) -> Result<()> {
        let url = self.client.url(&[&self.name, "_ensure_full_commit"])?;
        let _: Response = self.client.post_empty(url).await?;
        Ok(())
    }

    /// Fetch the latest revision of a document
    pub async fn find<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        ensure_not_empty(Some(id), "document id")?;
        self.client.get_json(self.client.url(&[&self.name, id])?).await
    }

    /// Fetch a specific revision of a document
    pub async fn find_with_rev<T: DeserializeOwned>(&self, id: &str, rev: &str) -> Result<T> {
        ensure_not_empty(Some(id), "document id")?;
        ensure_not_empty(Some(rev), "document revision")?;
        let mut url = self.client.url(&[&self.name, id])?;
        url.query_pairs_mut().append_pair("rev", rev);
        self.client.get_json(url).await
    }

    /// Store a new document.
    ///
    /// When the document carries a non-empty `_id`, it is stored under that
    /// id via PUT; otherwise the server assigns one via POST. An explicitly
    /// empty `_id` is rejected before any network I/O.
    pub async fn save<T: Serialize>(&self, doc: &T) -> Result<Response> {
        let value = to_body(doc)?;
        match value.get("_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {
                let url = self.client.url(&[&self.name, id])?;
                self.client.put_json(url, &value).await
            }
            Some(_) => Err(Error::Validation("document id may not be empty".to_string())),
            None => {
                let url = self.client.url(&[&self.name])?;
                self.client.post_json(url, &value).await
            }
        }
    }

    /// Update an existing document; `_id` and `_rev` are both required
    pub async fn update<T: Serialize>(&self, doc: &T) -> Result<Response> {
        let value = to_body(doc)?;
        let id = value.get("_id").and_then(Value::as_str);
        let rev = value.get("_rev").and_then(Value::as_str);
        ensure_not_empty(id, "document id")?;
        ensure_not_empty(rev, "document revision")?;
        let url = self.client.url(&[&self.name, id.unwrap_or_default()])?;
        self.client.put_json(url, &value).await
    }

    /// Delete a document revision
    pub async fn remove(&self, id: &str, rev: &str) -> Result<Response> {
        ensure_not_empty(Some(id), "document id")?;
        ensure_not_empty(Some(rev), "document revision")?;
        let mut url = self.client.url(&[&self.name, id])?;
        url.query_pairs_mut().append_pair("rev", rev);
        self.client.delete_json(url).await
    }
}

fn to_body<T: Serialize>(doc: &T) -> Result<Value> {
    serde_json::to_value(doc).map_err(|e| Error::Json(format!("failed to serialize document: {e}")))
}
