//! The Rabbit Hole: asynchronous ingestion of uploaded files into the
//! engine's long-term memory.
//!
//! Uploads are validated against a short MIME allow-list at the HTTP
//! boundary; everything past that point runs out-of-band and never reports
//! back to the uploader.

use crate::config::*;
use crate::engine::{ConversationEngine, EngineError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// One uploaded file, as received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Membership check against the admitted MIME types.
pub fn admitted_mime_type(content_type: &str) -> bool {
    ADMITTED_MIME_TYPES.contains(&content_type)
}

/// Human-readable rejection message for an unsupported upload.
pub fn unsupported_mime_detail(content_type: &str) -> String {
    format!(
        "MIME type {} not supported. Admitted types: {}",
        content_type,
        ADMITTED_MIME_TYPES.join(" - ")
    )
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file {0} is not valid UTF-8 text")]
    InvalidText(String),

    #[error("failed to extract text from {0}")]
    Extraction(String),

    #[error("no ingestible content in {0}")]
    Empty(String),

    #[error("temp file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine rejected chunk: {0}")]
    Engine(#[from] EngineError),
}

#[async_trait]
pub trait IngestionPipeline: Send + Sync {
    async fn ingest(
        &self,
        file: UploadedFile,
        engine: Arc<dyn ConversationEngine>,
    ) -> Result<(), IngestError>;
}

/// Default pipeline: extract text from the upload, split it into chunks,
/// feed each chunk to the engine's memory.
pub struct RabbitHole;

impl RabbitHole {
    async fn extract_text(file: &UploadedFile) -> Result<String, IngestError> {
        match file.content_type.as_str() {
            "text/plain" => std::str::from_utf8(&file.bytes)
                .map(str::to_string)
                .map_err(|_| IngestError::InvalidText(file.filename.clone())),
            "application/pdf" => {
                let bytes = file.bytes.clone();
                let filename = file.filename.clone();
                // pdf-extract wants a path, so spill to the temp dir under a
                // server-generated name; client filenames never become paths.
                // Spill and extraction are blocking, keep them off the runtime.
                let result = tokio::task::spawn_blocking(move || {
                    let temp_path =
                        std::env::temp_dir().join(format!("catgate-{}.pdf", Uuid::new_v4()));
                    std::fs::write(&temp_path, &bytes)?;
                    let extracted = pdf_extract::extract_text(&temp_path);
                    let _ = std::fs::remove_file(&temp_path);
                    extracted.map_err(|_| IngestError::Extraction(filename))
                })
                .await;
                match result {
                    Ok(inner) => inner,
                    Err(e) => Err(IngestError::Extraction(format!(
                        "{} ({})",
                        file.filename, e
                    ))),
                }
            }
            other => Err(IngestError::Extraction(format!(
                "{} ({})",
                file.filename, other
            ))),
        }
    }
}

/// Split extracted text into memorizable chunks: accumulate paragraphs up to
/// the chunk budget, never splitting inside a paragraph.
pub fn chunk_text(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in content.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + para.len() > INGEST_CHUNK_SIZE {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl IngestionPipeline for RabbitHole {
    async fn ingest(
        &self,
        file: UploadedFile,
        engine: Arc<dyn ConversationEngine>,
    ) -> Result<(), IngestError> {
        let text = Self::extract_text(&file).await?;
        let chunks = chunk_text(&text);

        if chunks.is_empty() {
            return Err(IngestError::Empty(file.filename));
        }

        let total = chunks.len();
        for chunk in chunks {
            engine.memorize(&chunk).await?;
        }

        info!("Ingested {} ({} chunks)", file.filename, total);
        Ok(())
    }
}
