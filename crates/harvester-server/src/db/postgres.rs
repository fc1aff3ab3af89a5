//! Postgres-backed metadata store
//!
//! Upserts are a single atomic `INSERT .. ON CONFLICT (source_url) DO UPDATE`
//! so concurrent duplicate ingests never race a read-merge-write cycle: the
//! jsonb `||` operator shallow-merges the attribute maps with the incoming
//! keys winning, every other field is overwritten, and the row id survives.
//! The unique constraint on source_url is established by migration 0001.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use super::models::{DocumentRecord, MediaRecord, NewDocumentRecord, NewMediaRecord};
use super::{MetadataStore, StoreError};

#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn upsert_media(&self, record: NewMediaRecord) -> Result<Uuid, StoreError> {
        debug!(source_url = %record.source_url, "Upserting media record");

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO media_records (
                id, source_url, title, duration_seconds, filename,
                byte_size, blob_object_name, downloaded_at, attributes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), $8)
            ON CONFLICT (source_url) DO UPDATE SET
                title = EXCLUDED.title,
                duration_seconds = EXCLUDED.duration_seconds,
                filename = EXCLUDED.filename,
                byte_size = EXCLUDED.byte_size,
                blob_object_name = EXCLUDED.blob_object_name,
                downloaded_at = NOW(),
                attributes = media_records.attributes || EXCLUDED.attributes
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.source_url)
        .bind(&record.title)
        .bind(record.duration_seconds)
        .bind(&record.filename)
        .bind(record.byte_size)
        .bind(&record.blob_object_name)
        .bind(Json(record.attributes))
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_document(&self, record: NewDocumentRecord) -> Result<Uuid, StoreError> {
        debug!(source_url = %record.source_url, "Upserting document record");

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO document_records (
                id, source_url, filename, byte_size, blob_object_name,
                downloaded_at, attributes
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            ON CONFLICT (source_url) DO UPDATE SET
                filename = EXCLUDED.filename,
                byte_size = EXCLUDED.byte_size,
                blob_object_name = EXCLUDED.blob_object_name,
                downloaded_at = NOW(),
                attributes = document_records.attributes || EXCLUDED.attributes
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.source_url)
        .bind(&record.filename)
        .bind(record.byte_size)
        .bind(&record.blob_object_name)
        .bind(Json(record.attributes))
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_media(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let records = sqlx::query_as::<_, MediaRecord>(
            r#"
            SELECT id, source_url, title, duration_seconds, filename,
                   byte_size, blob_object_name, downloaded_at, attributes
            FROM media_records
            ORDER BY downloaded_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let records = sqlx::query_as::<_, DocumentRecord>(
            r#"
            SELECT id, source_url, filename, byte_size, blob_object_name,
                   downloaded_at, attributes
            FROM document_records
            ORDER BY downloaded_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError> {
        let record = sqlx::query_as::<_, MediaRecord>(
            r#"
            SELECT id, source_url, title, duration_seconds, filename,
                   byte_size, blob_object_name, downloaded_at, attributes
            FROM media_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            r#"
            SELECT id, source_url, filename, byte_size, blob_object_name,
                   downloaded_at, attributes
            FROM document_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
