//! Ad-hoc replication: `POST /_replicate`
//!
//! A replication request is assembled through chained setters and submitted
//! once with [`Replication::trigger`]. Every optional field is emitted on
//! the wire only when explicitly set; CouchDB treats an absent key
//! differently from an explicit `false` or empty value.

use crate::client::Client;
use crate::error::{ensure_not_empty, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// OAuth credentials for an authenticated replication target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OauthCredentials {
    pub consumer_secret: String,
    pub consumer_key: String,
    pub token_secret: String,
    pub token: String,
}

/// Wrapper producing the `auth: {oauth: {...}}` wire nesting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAuth {
    pub oauth: OauthCredentials,
}

/// Replication target wire shape.
///
/// CouchDB accepts either a bare database name/URL or, when the target
/// requires OAuth, a nested `{url, auth: {oauth: {...}}}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplicationTarget {
    Plain(String),
    WithOauth { url: String, auth: TargetAuth },
}

impl ReplicationTarget {
    /// The target database name or URL, regardless of auth mode
    pub fn url(&self) -> &str {
        match self {
            Self::Plain(url) => url,
            Self::WithOauth { url, .. } => url,
        }
    }
}

/// Wire body for `POST /_replicate`.
///
/// Unset fields are never emitted, not even as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ReplicationTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel: Option<bool>,
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
    pub since_seq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_target: Option<bool>,
}

/// Builder for an ad-hoc replication request.
///
/// Consumed by [`trigger`](Self::trigger); build a fresh one per logical
/// replication task.
#[derive(Debug)]
pub struct Replication {
    client: Client,
    source: Option<String>,
    target: Option<String>,
    target_oauth: Option<OauthCredentials>,
    cancel: Option<bool>,
    continuous: Option<bool>,
    filter: Option<String>,
    query_params: Option<Map<String, Value>>,
    doc_ids: Option<Vec<String>>,
    proxy: Option<String>,
    since_seq: Option<String>,
    create_target: Option<bool>,
}

impl Replication {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            source: None,
            target: None,
            target_oauth: None,
            cancel: None,
            continuous: None,
            filter: None,
            query_params: None,
            doc_ids: None,
            proxy: None,
            since_seq: None,
            create_target: None,
        }
    }

    /// Source database name or URL
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Target database name or URL
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Keep the replication running as a background process
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = Some(continuous);
        self
    }

    /// Cancel a matching in-flight replication instead of starting one
    pub fn cancel(mut self, cancel: bool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Filter function name, `"designdoc/filtername"`
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Add a single parameter passed to the filter function
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace the full set of filter parameters
    pub fn query_params(mut self, params: Map<String, Value>) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Restrict replication to an explicit document-id set
    pub fn doc_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Route replication through an HTTP proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Create the target database if it does not exist
    pub fn create_target(mut self, create_target: bool) -> Self {
        self.create_target = Some(create_target);
        self
    }

    /// Resume from an update sequence (opaque checkpoint token)
    pub fn since_seq(mut self, since_seq: impl Into<String>) -> Self {
        self.since_seq = Some(since_seq.into());
        self
    }

    /// Authenticate against the target with OAuth credentials.
    ///
    /// The target then serializes as `{url, auth: {oauth: {...}}}` instead
    /// of a bare string.
    pub fn target_oauth(
        mut self,
        consumer_secret: impl Into<String>,
        consumer_key: impl Into<String>,
        token_secret: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.target_oauth = Some(OauthCredentials {
            consumer_secret: consumer_secret.into(),
            consumer_key: consumer_key.into(),
            token_secret: token_secret.into(),
            token: token.into(),
        });
        self
    }

    /// Submit the request and return the server's replication summary.
    ///
    /// With `continuous(true)` the server answers immediately while the job
    /// keeps running in the background; the returned result carries
    /// `local_id` instead of a history.
    pub async fn trigger(self) -> Result<ReplicationResult> {
        let body = self.build_request()?;
        debug!(continuous = ?body.continuous, cancel = ?body.cancel, "triggering replication");
        let url = self.client.url(&["_replicate"])?;
        self.client.post_json(url, &body).await
    }

    fn build_request(&self) -> Result<ReplicationRequest> {
        ensure_not_empty(self.source.as_deref(), "source")?;
        ensure_not_empty(self.target.as_deref(), "target")?;
        let target = self.target.clone().map(|url| match self.target_oauth.clone() {
            Some(oauth) => ReplicationTarget::WithOauth {
                url,
                auth: TargetAuth { oauth },
            },
            None => ReplicationTarget::Plain(url),
        });
        Ok(ReplicationRequest {
            source: self.source.clone(),
            target,
            cancel: self.cancel,
            continuous: self.continuous,
            filter: self.filter.clone(),
            query_params: self.query_params.clone(),
            doc_ids: self.doc_ids.clone(),
            proxy: self.proxy.clone(),
            since_seq: self.since_seq.clone(),
            create_target: self.create_target,
        })
    }
}

/// Server response to an ad-hoc trigger
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplicationResult {
    #[serde(default)]
    pub ok: bool,
    pub session_id: Option<String>,
    /// Opaque sequence; compound on clustered servers
    pub source_last_seq: Option<Value>,
    #[serde(default)]
    pub no_changes: bool,
    /// Job identifier returned for continuous replications
    #[serde(rename = "_local_id")]
    pub local_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ReplicationHistory>,
}

/// One replication session summary; all fields pass through opaquely
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplicationHistory {
    pub session_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub start_last_seq: Option<Value>,
    pub end_last_seq: Option<Value>,
    pub recorded_seq: Option<Value>,
    pub missing_checked: Option<u64>,
    pub missing_found: Option<u64>,
    pub docs_read: Option<u64>,
    pub docs_written: Option<u64>,
    pub doc_write_failures: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;

    fn builder() -> Replication {
        Client::new(ClientConfig::new("http://localhost:5984"))
            .unwrap()
            .replication()
    }

    #[test]
    fn test_minimal_request_has_exactly_two_keys() {
        let body = builder()
            .source("albums")
            .target("albums-backup")
            .build_request()
            .unwrap();
        let value = serde_json::to_value(&body).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["source"], "albums");
        assert_eq!(obj["target"], "albums-backup");
    }

    #[test]
    fn test_unset_fields_are_omitted_not_null() {
        let body = builder()
            .source("a")
            .target("b")
            .continuous(false)
            .build_request()
            .unwrap();
        let value = serde_json::to_value(&body).unwrap();
        // Explicit false is on the wire; everything unset is absent.
        assert_eq!(value["continuous"], json!(false));
        assert!(value.get("cancel").is_none());
        assert!(value.get("filter").is_none());
        assert!(value.get("create_target").is_none());
    }

    #[test]
    fn test_full_request_wire_names() {
        let body = builder()
            .source("a")
            .target("b")
            .continuous(true)
            .cancel(true)
            .filter("app/by_owner")
            .query_param("owner", "kate")
            .doc_ids(["d1", "d2"])
            .proxy("http://proxy:8080")
            .since_seq("42-seq")
            .create_target(true)
            .build_request()
            .unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["filter"], "app/by_owner");
        assert_eq!(value["query_params"]["owner"], "kate");
        assert_eq!(value["doc_ids"], json!(["d1", "d2"]));
        assert_eq!(value["proxy"], "http://proxy:8080");
        assert_eq!(value["since_seq"], "42-seq");
        assert_eq!(value["create_target"], json!(true));
    }

    #[test]
    fn test_oauth_target_nests_url_and_auth() {
        let body = builder()
            .source("a")
            .target("http://remote:5984/b")
            .target_oauth("sec", "key", "tsec", "tok")
            .build_request()
            .unwrap();
        let value = serde_json::to_value(&body).unwrap();
        let target = &value["target"];
        assert!(!target.is_string());
        assert_eq!(target["url"], "http://remote:5984/b");
        let oauth = &target["auth"]["oauth"];
        assert_eq!(oauth["consumer_secret"], "sec");
        assert_eq!(oauth["consumer_key"], "key");
        assert_eq!(oauth["token_secret"], "tsec");
        assert_eq!(oauth["token"], "tok");
    }

    #[test]
    fn test_oauth_fields_assigned_independently() {
        // Regression: consumer_secret must never mirror consumer_key.
        let body = builder()
            .source("a")
            .target("b")
            .target_oauth("secret-1", "key-2", "ts", "t")
            .build_request()
            .unwrap();
        match body.target {
            Some(ReplicationTarget::WithOauth { auth, .. }) => {
                assert_eq!(auth.oauth.consumer_secret, "secret-1");
                assert_eq!(auth.oauth.consumer_key, "key-2");
                assert_ne!(auth.oauth.consumer_secret, auth.oauth.consumer_key);
            }
            other => panic!("expected oauth target, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_preserves_set_and_unset() {
        let body = builder()
            .source("a")
            .target("b")
            .continuous(true)
            .since_seq("7-x")
            .build_request()
            .unwrap();
        let json = serde_json::to_string(&body).unwrap();
        let back: ReplicationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, body);
        assert!(back.cancel.is_none());
        assert!(back.query_params.is_none());
        assert_eq!(back.continuous, Some(true));
    }

    #[test]
    fn test_target_deserializes_both_shapes() {
        let plain: ReplicationTarget = serde_json::from_str(r#""albums""#).unwrap();
        assert_eq!(plain, ReplicationTarget::Plain("albums".into()));

        let with_auth: ReplicationTarget = serde_json::from_str(
            r#"{"url":"http://r/b","auth":{"oauth":{"consumer_secret":"s","consumer_key":"k","token_secret":"ts","token":"t"}}}"#,
        )
        .unwrap();
        assert_eq!(with_auth.url(), "http://r/b");
    }

    #[tokio::test]
    async fn test_trigger_requires_source_and_target() {
        let err = builder().target("b").trigger().await.unwrap_err();
        assert!(err.is_validation());

        let err = builder().source("a").trigger().await.unwrap_err();
        assert!(err.is_validation());

        let err = builder().source("").target("b").trigger().await.unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_result_deserializes_history() {
        let result: ReplicationResult = serde_json::from_str(
            r#"{"ok":true,"session_id":"abc","source_last_seq":28,
                "history":[{"session_id":"abc","docs_read":3,"docs_written":3,
                            "start_last_seq":0,"end_last_seq":28}]}"#,
        )
        .unwrap();
        assert!(result.ok);
        assert_eq!(result.history.len(), 1);
        assert_eq!(result.history[0].docs_written, Some(3));
    }

    #[test]
    fn test_continuous_result_carries_local_id() {
        let result: ReplicationResult =
            serde_json::from_str(r#"{"ok":true,"_local_id":"0a81b645"}"#).unwrap();
        assert!(result.ok);
        assert_eq!(result.local_id.as_deref(), Some("0a81b645"));
        assert!(result.history.is_empty());
    }
}
