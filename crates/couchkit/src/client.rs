//! CouchDB client with connection pooling and typed JSON exchanges

use crate::config::ClientConfig;
use crate::database::Database;
use crate::error::{self, ensure_not_empty, Error, Result};
use crate::replication::Replication;
use crate::replicator::Replicator;
use crate::types::{DbUpdates, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Confirmation string required by [`Client::delete_database`]
pub const DELETE_CONFIRMATION: &str = "delete database";

/// Async CouchDB client
///
/// Cheaply cloneable; all clones share one connection pool.
///
/// # Example
///
/// ```ignore
/// use couchkit::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> couchkit::Result<()> {
///     let client = Client::new(ClientConfig::new("http://localhost:5984"))?;
///
///     let result = client
///         .replication()
///         .source("source-db")
///         .target("target-db")
///         .create_target(true)
///         .trigger()
///         .await?;
///     println!("ok: {}", result.ok);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base: Url,
    config: ClientConfig,
}

impl Client {
    /// Create a new client for the configured server
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner { http, base, config }),
        })
    }

    /// The server base URL
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// Start building an ad-hoc replication request (`POST /_replicate`)
    pub fn replication(&self) -> Replication {
        Replication::new(self.clone())
    }

    /// Start building a persistent replication document operation
    pub fn replicator(&self) -> Replicator {
        Replicator::new(self.clone())
    }

    /// Handle for database-scoped operations (info, compaction, document CRUD)
    pub fn database(&self, name: impl Into<String>) -> Database {
        Database::new(self.clone(), name)
    }

    // Server-level operations

    /// List all databases on the server
    pub async fn all_dbs(&self) -> Result<Vec<String>> {
        self.get_json(self.url(&["_all_dbs"])?).await
    }

    /// Create a database if it does not already exist
    pub async fn create_database(&self, name: &str) -> Result<()> {
        self.create_database_inner(name, None).await
    }

    /// Create a database with an explicit number of range partitions
    pub async fn create_database_with_shards(&self, name: &str, shards: u32) -> Result<()> {
        self.create_database_inner(name, Some(shards)).await
    }

    async fn create_database_inner(&self, name: &str, shards: Option<u32>) -> Result<()> {
        ensure_not_empty(Some(name), "database name")?;
        let mut url = self.url(&[name])?;
        if let Some(q) = shards {
            url.query_pairs_mut().append_pair("q", &q.to_string());
        }
        match self.get_json::<serde_json::Value>(url.clone()).await {
            Ok(_) => Ok(()),
            Err(Error::NotFound { .. }) => {
                let _: Response = self.put_empty(url).await?;
                info!(db = name, "created database");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a database.
    ///
    /// Destructive; `confirm` must be the literal string
    /// [`DELETE_CONFIRMATION`] or the call fails before any network I/O.
    pub async fn delete_database(&self, name: &str, confirm: &str) -> Result<()> {
        ensure_not_empty(Some(name), "database name")?;
        if confirm != DELETE_CONFIRMATION {
            return Err(Error::Validation(format!(
                "invalid confirmation, expected {DELETE_CONFIRMATION:?}"
            )));
        }
        let _: Response = self.delete_json(self.url(&[name])?).await?;
        Ok(())
    }

    /// The server version string
    pub async fn server_version(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Welcome {
            version: String,
        }
        let welcome: Welcome = self.get_json(self.url(&[])?).await?;
        Ok(welcome.version)
    }

    /// Request `count` server-generated UUIDs
    pub async fn uuids(&self, count: usize) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Uuids {
            uuids: Vec<String>,
        }
        let mut url = self.url(&["_uuids"])?;
        url.query_pairs_mut().append_pair("count", &count.to_string());
        let resp: Uuids = self.get_json(url).await?;
        Ok(resp.uuids)
    }

    /// Database-level events across the whole server (`GET /_db_updates`)
    pub async fn db_updates(&self, since: Option<&str>) -> Result<DbUpdates> {
        let mut url = self.url(&["_db_updates"])?;
        if let Some(seq) = since.filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("since", seq);
        }
        self.get_json(url).await
    }

    // Request plumbing

    /// Build a URL from the base plus percent-encoded path segments
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Validation("base URL cannot carry path segments".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(method = "GET", url = %url, "couchdb request");
        let req = self.authed(self.inner.http.get(url));
        self.finish(req).await
    }

    pub(crate) async fn put_json<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method = "PUT", url = %url, "couchdb request");
        let req = self.authed(self.inner.http.put(url)).json(body);
        self.finish(req).await
    }

    pub(crate) async fn put_empty<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(method = "PUT", url = %url, "couchdb request");
        let req = self.authed(self.inner.http.put(url));
        self.finish(req).await
    }

    pub(crate) async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method = "POST", url = %url, "couchdb request");
        let req = self.authed(self.inner.http.post(url)).json(body);
        self.finish(req).await
    }

    /// POST with no payload; CouchDB still requires a JSON content type
    /// on `_compact` and `_ensure_full_commit`.
    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(method = "POST", url = %url, "couchdb request");
        let req = self
            .authed(self.inner.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        self.finish(req).await
    }

    pub(crate) async fn delete_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(method = "DELETE", url = %url, "couchdb request");
        let req = self.authed(self.inner.http.delete(url));
        self.finish(req).await
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.inner.config.username {
            Some(user) => req.basic_auth(user, self.inner.config.password.as_deref()),
            None => req,
        }
    }

    async fn finish<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        if (200..300).contains(&status) {
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::Json(format!("failed to decode response: {e}")))
        } else {
            Err(error::from_status(status, &bytes))
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base.as_str())
            .field("timeout", &self.inner.config.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        Client::new(ClientConfig::new("http://localhost:5984")).unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = test_client();
        assert_eq!(
            client.url(&["_replicate"]).unwrap().as_str(),
            "http://localhost:5984/_replicate"
        );
        assert_eq!(
            client.url(&["_replicator", "repl-1"]).unwrap().as_str(),
            "http://localhost:5984/_replicator/repl-1"
        );
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = test_client();
        // A design doc id contains a slash; it must land in one segment.
        let url = client.url(&["db", "_design/filters"]).unwrap();
        assert_eq!(url.path(), "/db/_design%2Ffilters");
    }

    #[test]
    fn test_url_respects_base_path() {
        let client = Client::new(ClientConfig::new("http://localhost:5984/couch")).unwrap();
        assert_eq!(
            client.url(&["_all_dbs"]).unwrap().as_str(),
            "http://localhost:5984/couch/_all_dbs"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(Client::new(ClientConfig::new("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_delete_database_confirmation_gate() {
        let client = test_client();
        let err = client.delete_database("important", "yes").await.unwrap_err();
        assert!(err.is_validation());

        let err = client.delete_database("", DELETE_CONFIRMATION).await.unwrap_err();
        assert!(err.is_validation());
    }
}
