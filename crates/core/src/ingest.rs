use crate::error::CoreError;
use crate::models::{Document, Identity};
use crate::normalizer;
use crate::policy::{self, Action};
use crate::traits::{BlobStore, DocumentStore, KnowledgeEngine};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Upper bound for one knowledge-engine insert.
    pub insert_timeout: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            insert_timeout: Duration::from_secs(120),
        }
    }
}

/// Coordinator for document processing: blob fetch, normalization, metadata
/// envelope, engine insert, processed flag. A document stays `uploaded`
/// until the whole chain succeeds; retry is an explicit re-invocation.
pub struct IngestCoordinator<D, B, E>
where
    D: DocumentStore,
    B: BlobStore,
    E: KnowledgeEngine + 'static,
{
    documents: D,
    blobs: B,
    engine: Arc<E>,
    options: IngestOptions,
}

impl<D, B, E> IngestCoordinator<D, B, E>
where
    D: DocumentStore,
    B: BlobStore,
    E: KnowledgeEngine + 'static,
{
    pub fn new(documents: D, blobs: B, engine: Arc<E>) -> Self {
        Self::with_options(documents, blobs, engine, IngestOptions::default())
    }

    pub fn with_options(documents: D, blobs: B, engine: Arc<E>, options: IngestOptions) -> Self {
        Self {
            documents,
            blobs,
            engine,
            options,
        }
    }

    /// Store uploaded bytes and record the document as unprocessed. The blob
    /// key is collision-resistant: a fresh uuid prefixed to the filename.
    pub async fn upload(
        &self,
        identity: &Identity,
        filename: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<Document, CoreError> {
        policy::authorize(identity, Action::UploadDocument)?;

        if !normalizer::is_supported(filename) {
            return Err(CoreError::Validation(
                "only PDF and DOC/DOCX files are supported".to_string(),
            ));
        }

        let blob_key = format!("documents/{}_{}", Uuid::new_v4(), filename);
        self.blobs.put(&blob_key, content).await?;

        let document = Document {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            blob_key,
            processed: false,
            uploaded_by: identity.user_id,
            uploaded_at: Utc::now(),
            file_size: content.len() as u64,
            content_type: content_type.to_string(),
        };
        self.documents.insert_document(&document).await?;
        info!(document_id = %document.id, filename, "document uploaded");

        Ok(document)
    }

    /// Normalize one uploaded document and add it to the knowledge engine.
    ///
    /// `processed` flips to true only after the insert returned; any earlier
    /// failure leaves the document exactly as it was. Re-invoking on an
    /// already-processed document is rejected rather than re-executed, so the
    /// engine never receives duplicate inserts.
    pub async fn ingest(&self, identity: &Identity, document_id: Uuid) -> Result<(), CoreError> {
        policy::authorize(identity, Action::ProcessDocument)?;

        let document = self
            .documents
            .document(document_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document not found: {document_id}")))?;

        if document.processed {
            return Err(CoreError::AlreadyProcessed(format!(
                "document already processed: {document_id}"
            )));
        }

        let bytes = self.blobs.get(&document.blob_key).await?;

        let text = normalizer::extract_text(&bytes, &document.filename)?;
        if text.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "no readable text in {}",
                document.filename
            )));
        }

        let envelope = metadata_envelope(&document, &text);
        self.insert_into_engine(document.id, envelope).await?;

        self.documents.mark_processed(document.id).await?;
        info!(document_id = %document.id, filename = %document.filename, "document ingested");
        Ok(())
    }

    /// All uploaded documents, newest first.
    pub async fn documents(&self, identity: &Identity) -> Result<Vec<Document>, CoreError> {
        policy::authorize(identity, Action::ListDocuments)?;
        self.documents.documents().await
    }

    /// Remove a document record and its stored blob. Content already indexed
    /// by the engine is not retracted; the engine is append-only from this
    /// side of the boundary.
    pub async fn delete(&self, identity: &Identity, document_id: Uuid) -> Result<(), CoreError> {
        policy::authorize(identity, Action::DeleteDocument)?;

        let document = self
            .documents
            .document(document_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document not found: {document_id}")))?;

        self.blobs.delete(&document.blob_key).await?;
        self.documents.delete_document(document_id).await?;
        info!(document_id = %document_id, "document deleted");
        Ok(())
    }

    /// Same worker posture as chat queries: the insert rides a spawned task
    /// so an aborted caller never kills it mid-write.
    async fn insert_into_engine(
        &self,
        document_id: Uuid,
        envelope: String,
    ) -> Result<(), CoreError> {
        let engine = Arc::clone(&self.engine);
        let worker = tokio::spawn(async move { engine.insert(&envelope).await });

        match tokio::time::timeout(self.options.insert_timeout, worker).await {
            Ok(Ok(outcome)) => outcome.map_err(|engine_error| {
                error!(%engine_error, %document_id, "knowledge engine insert failed");
                engine_error
            }),
            Ok(Err(join_error)) => {
                error!(%join_error, %document_id, "knowledge engine worker failed");
                Err(CoreError::Engine(format!(
                    "engine worker failed: {join_error}"
                )))
            }
            Err(_) => {
                error!(%document_id, "knowledge engine insert timed out");
                Err(CoreError::Engine(format!(
                    "engine insert timed out after {:?}",
                    self.options.insert_timeout
                )))
            }
        }
    }
}

/// The indexed text carries its provenance inline, so engine answers can
/// surface which file and upload they came from.
fn metadata_envelope(document: &Document, text: &str) -> String {
    format!(
        "DOCUMENT METADATA:\n\
         - Filename: {}\n\
         - Uploaded: {}\n\
         - File Size: {} bytes\n\n\
         DOCUMENT CONTENT:\n\
         {}",
        document.filename,
        document.uploaded_at.to_rfc3339(),
        document.file_size,
        text
    )
}

/// Recursively discover ingestible files under a folder, sorted for a
/// stable upload order.
pub fn discover_corpus_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(normalizer::is_supported);

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}
