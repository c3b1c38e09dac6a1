//! Background dispatch for ingestion work.
//!
//! One bounded channel, one worker task. The upload endpoint enqueues and
//! returns immediately; the worker drains jobs on the same runtime.

use crate::engine::ConversationEngine;
use crate::rabbit_hole::{IngestionPipeline, UploadedFile};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct IngestJob {
    pub file: UploadedFile,
}

pub struct IngestQueue {
    sender: mpsc::Sender<IngestJob>,
}

impl IngestQueue {
    pub fn new(
        pipeline: Arc<dyn IngestionPipeline>,
        engine: Arc<dyn ConversationEngine>,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity);

        tokio::spawn(async move {
            while let Some(IngestJob { file }) = rx.recv().await {
                let filename = file.filename.clone();
                info!("Ingesting {} ({})", filename, file.content_type);

                // Failures stay server-side; the uploader is never notified
                if let Err(e) = pipeline.ingest(file, engine.clone()).await {
                    error!("Ingestion of {} failed: {}", filename, e);
                }
            }
        });

        Self { sender: tx }
    }

    pub async fn enqueue(&self, job: IngestJob) {
        if let Err(e) = self.sender.send(job).await {
            warn!("Failed to enqueue ingestion job: {}", e);
        }
    }
}
