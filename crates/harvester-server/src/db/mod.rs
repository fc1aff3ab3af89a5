//! Metadata store capability
//!
//! Records for ingested media and documents live in two Postgres collections
//! keyed by their unique source URL. The store is injected into the
//! orchestrator as a trait object so tests can substitute an in-memory
//! implementation.

pub mod models;
pub mod postgres;

pub use models::{
    Attributes, DocumentRecord, MediaRecord, NewDocumentRecord, NewMediaRecord,
};
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(Uuid),
}

/// Queryable record store keyed by unique source URL.
///
/// `upsert_*` carries merge-on-duplicate semantics: a second ingest of the
/// same source URL must not create a second record. The existing record keeps
/// its id, every other top-level field is overwritten with the new values,
/// the downloaded-at timestamp is refreshed, and the attribute maps are
/// shallow-merged with new keys winning on conflict.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upsert_media(&self, record: NewMediaRecord) -> Result<Uuid, StoreError>;

    async fn upsert_document(&self, record: NewDocumentRecord) -> Result<Uuid, StoreError>;

    async fn list_media(&self) -> Result<Vec<MediaRecord>, StoreError>;

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError>;

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError>;
}
