//! couchkit: typed async client for the CouchDB HTTP REST API
//!
//! Every operation maps directly to a documented HTTP endpoint: database
//! administration, document CRUD, and replication management, both as ad-hoc
//! triggers (`POST /_replicate`) and as persistent `_replicator` documents.
//!
//! # Architecture
//!
//! - [`Client`]: connection-pooled entry point; server-level admin calls
//! - [`Database`]: per-database handle with document CRUD and maintenance
//! - [`Replication`]: consuming builder for one-shot replication triggers
//! - [`Replicator`]: consuming builder for `_replicator` document lifecycle
//!
//! Optional request fields follow a strict omit-if-absent rule: a field is
//! on the wire only when explicitly set, never as `null`, because CouchDB
//! interprets absence differently from an explicit false/empty value.

pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod replication;
pub mod replicator;
pub mod types;

pub use client::{Client, DELETE_CONFIRMATION};
pub use config::ClientConfig;
pub use database::Database;
pub use error::{Error, Result};
pub use replication::{
    OauthCredentials, Replication, ReplicationHistory, ReplicationRequest, ReplicationResult,
    ReplicationTarget, TargetAuth,
};
pub use replicator::{
    IdGenerator, Replicator, ReplicatorDocument, UserCtx, UuidGenerator, DEFAULT_REPLICATOR_DB,
};
pub use types::{CouchDbInfo, DbUpdateEvent, DbUpdates, Document, Response};
