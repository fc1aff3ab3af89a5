//! Record models for the media and document collections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Open key-value attribute map attached to every record.
///
/// Upstream resolvers yield heterogeneous fields per source site (uploader,
/// publish date, format used, ...), so this stays an open mapping with merge
/// semantics rather than a fixed schema.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A persisted media (video) record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaRecord {
    pub id: Uuid,
    pub source_url: String,
    pub title: String,
    pub duration_seconds: Option<i64>,
    pub filename: String,
    pub byte_size: Option<i64>,
    /// Object name in blob storage; `None` marks a failed or partial ingest
    /// that must never be served as downloadable.
    pub blob_object_name: Option<String>,
    pub downloaded_at: DateTime<Utc>,
    pub attributes: Json<Attributes>,
}

/// A persisted document (PDF) record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub source_url: String,
    pub filename: String,
    pub byte_size: Option<i64>,
    pub blob_object_name: Option<String>,
    pub downloaded_at: DateTime<Utc>,
    pub attributes: Json<Attributes>,
}

/// Fields for inserting or re-ingesting a media record
#[derive(Debug, Clone)]
pub struct NewMediaRecord {
    pub source_url: String,
    pub title: String,
    pub duration_seconds: Option<i64>,
    pub filename: String,
    pub byte_size: i64,
    pub blob_object_name: String,
    pub attributes: Attributes,
}

/// Fields for inserting or re-ingesting a document record
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub source_url: String,
    pub filename: String,
    pub byte_size: i64,
    pub blob_object_name: String,
    pub attributes: Attributes,
}

impl MediaRecord {
    /// Whether the stored blob can be served
    pub fn is_downloadable(&self) -> bool {
        self.blob_object_name.is_some()
    }
}

impl DocumentRecord {
    /// Whether the stored blob can be served
    pub fn is_downloadable(&self) -> bool {
        self.blob_object_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_blob_is_not_downloadable() {
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            source_url: "https://example.com/a.pdf".to_string(),
            filename: "a.pdf".to_string(),
            byte_size: None,
            blob_object_name: None,
            downloaded_at: Utc::now(),
            attributes: Json(Attributes::new()),
        };
        assert!(!record.is_downloadable());
    }
}
