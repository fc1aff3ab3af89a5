//! Shared test doubles for pipeline tests
//!
//! In-memory implementations of the storage and metadata capabilities, plus
//! a resolver that never resolves (the document-path tests do not exercise
//! the video path).
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use harvester_server::db::{
    Attributes, DocumentRecord, MediaRecord, MetadataStore, NewDocumentRecord, NewMediaRecord,
    StoreError,
};
use harvester_server::scrape::resolver::{
    DownloadedMedia, FormatOption, MediaInfo, MediaResolver, ProgressSink, ResolveError,
};
use harvester_server::storage::{BlobError, BlobReader, BlobStore, UploadResult};

/// Blob store double that keeps uploaded objects in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryBlobStore {
    pub fn put_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn total_bytes(&self) -> usize {
        self.objects.lock().unwrap().iter().map(|(_, b)| b.len()).sum()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_bucket(&self) -> Result<(), BlobError> {
        Ok(())
    }

    async fn put(
        &self,
        object_name: &str,
        local_path: &Path,
        _content_type: Option<&str>,
    ) -> Result<UploadResult, BlobError> {
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len() as i64;
        self.objects
            .lock()
            .unwrap()
            .push((object_name.to_string(), bytes));
        Ok(UploadResult {
            object_name: object_name.to_string(),
            checksum: "test-checksum".to_string(),
            size,
        })
    }

    async fn get(&self, object_name: &str) -> Result<BlobReader, BlobError> {
        let objects = self.objects.lock().unwrap();
        let bytes = objects
            .iter()
            .find(|(name, _)| name == object_name)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| BlobError::NotFound(object_name.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(bytes)))
    }
}

/// Metadata store double with the same merge-on-duplicate contract as the
/// Postgres implementation: unique source_url, attributes shallow-merged
/// with new keys winning, id preserved, downloaded_at refreshed.
#[derive(Default)]
pub struct MemoryMetadataStore {
    pub media: Mutex<Vec<MediaRecord>>,
    pub documents: Mutex<Vec<DocumentRecord>>,
}

impl MemoryMetadataStore {
    pub fn media_count(&self) -> usize {
        self.media.lock().unwrap().len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

fn merge_attributes(existing: &Attributes, new: Attributes) -> Attributes {
    let mut merged = existing.clone();
    for (key, value) in new {
        merged.insert(key, value);
    }
    merged
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert_media(&self, record: NewMediaRecord) -> Result<Uuid, StoreError> {
        let mut media = self.media.lock().unwrap();
        if let Some(existing) = media.iter_mut().find(|r| r.source_url == record.source_url) {
            existing.title = record.title;
            existing.duration_seconds = record.duration_seconds;
            existing.filename = record.filename;
            existing.byte_size = Some(record.byte_size);
            existing.blob_object_name = Some(record.blob_object_name);
            existing.downloaded_at = Utc::now();
            existing.attributes = Json(merge_attributes(&existing.attributes.0, record.attributes));
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        media.push(MediaRecord {
            id,
            source_url: record.source_url,
            title: record.title,
            duration_seconds: record.duration_seconds,
            filename: record.filename,
            byte_size: Some(record.byte_size),
            blob_object_name: Some(record.blob_object_name),
            downloaded_at: Utc::now(),
            attributes: Json(record.attributes),
        });
        Ok(id)
    }

    async fn upsert_document(&self, record: NewDocumentRecord) -> Result<Uuid, StoreError> {
        let mut documents = self.documents.lock().unwrap();
        if let Some(existing) = documents
            .iter_mut()
            .find(|r| r.source_url == record.source_url)
        {
            existing.filename = record.filename;
            existing.byte_size = Some(record.byte_size);
            existing.blob_object_name = Some(record.blob_object_name);
            existing.downloaded_at = Utc::now();
            existing.attributes = Json(merge_attributes(&existing.attributes.0, record.attributes));
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        documents.push(DocumentRecord {
            id,
            source_url: record.source_url,
            filename: record.filename,
            byte_size: Some(record.byte_size),
            blob_object_name: Some(record.blob_object_name),
            downloaded_at: Utc::now(),
            attributes: Json(record.attributes),
        });
        Ok(id)
    }

    async fn list_media(&self) -> Result<Vec<MediaRecord>, StoreError> {
        Ok(self.media.lock().unwrap().clone())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError> {
        Ok(self.media.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}

/// Resolver double for tests that never touch the video path
pub struct UnusedResolver;

#[async_trait]
impl MediaResolver for UnusedResolver {
    async fn inspect(
        &self,
        _url: &str,
        _format: FormatOption,
    ) -> Result<Option<MediaInfo>, ResolveError> {
        Err(ResolveError::Process("resolver not under test".to_string()))
    }

    async fn download(
        &self,
        _url: &str,
        _output_dir: &Path,
        _format: FormatOption,
        _progress: Option<ProgressSink>,
    ) -> Result<DownloadedMedia, ResolveError> {
        Err(ResolveError::Process("resolver not under test".to_string()))
    }
}
