//! Shared response and document types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Write acknowledgement returned by document PUT/POST/DELETE
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub ok: bool,
    pub id: Option<String>,
    pub rev: Option<String>,
}

/// Identity fields shared by all CouchDB documents.
///
/// Embed with `#[serde(flatten)]` in user document types:
///
/// ```
/// use couchkit::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Task {
///     #[serde(flatten)]
///     doc: Document,
///     title: String,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// Database metadata from `GET /{db}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouchDbInfo {
    pub db_name: String,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(default)]
    pub doc_del_count: u64,
    /// Opaque update sequence; compound on clustered servers
    pub update_seq: Option<Value>,
    pub purge_seq: Option<Value>,
    #[serde(default)]
    pub compact_running: bool,
    pub disk_format_version: Option<u32>,
    pub instance_start_time: Option<String>,
}

/// Result of `GET /_db_updates`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbUpdates {
    #[serde(default)]
    pub results: Vec<DbUpdateEvent>,
    pub last_seq: Option<Value>,
}

/// A single database-level event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbUpdateEvent {
    pub db_name: String,
    /// Event kind: "created", "updated", or "deleted"
    #[serde(rename = "type")]
    pub kind: String,
    pub seq: Option<Value>,
}

/// Row set from `GET /{db}/_all_docs?include_docs=true`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AllDocsResponse {
    #[serde(default)]
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AllDocsRow {
    pub id: String,
    pub doc: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserialize() {
        let resp: Response =
            serde_json::from_str(r#"{"ok":true,"id":"doc1","rev":"1-abc"}"#).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.id.as_deref(), Some("doc1"));
        assert_eq!(resp.rev.as_deref(), Some("1-abc"));
    }

    #[test]
    fn test_db_info_compound_seq() {
        // Clustered CouchDB emits string sequences, older servers numbers;
        // both must deserialize.
        let info: CouchDbInfo = serde_json::from_str(
            r#"{"db_name":"tasks","doc_count":3,"update_seq":"12-g1AAAA"}"#,
        )
        .unwrap();
        assert_eq!(info.db_name, "tasks");
        assert_eq!(info.doc_count, 3);
        assert!(info.update_seq.is_some());

        let info: CouchDbInfo =
            serde_json::from_str(r#"{"db_name":"tasks","update_seq":42}"#).unwrap();
        assert_eq!(info.update_seq, Some(serde_json::json!(42)));
    }

    #[test]
    fn test_db_updates_deserialize() {
        let updates: DbUpdates = serde_json::from_str(
            r#"{"results":[{"db_name":"a","type":"created","seq":"1-x"}],"last_seq":"1-x"}"#,
        )
        .unwrap();
        assert_eq!(updates.results.len(), 1);
        assert_eq!(updates.results[0].kind, "created");
    }

    #[test]
    fn test_document_skips_unset_identity() {
        let doc = Document::default();
        assert_eq!(serde_json::to_string(&doc).unwrap(), "{}");

        let doc = Document {
            id: Some("doc1".into()),
            rev: None,
        };
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"_id":"doc1"}"#);
    }
}
