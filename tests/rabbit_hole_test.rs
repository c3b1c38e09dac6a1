use catgate::engine::{ConversationEngine, EngineError};
use catgate::rabbit_hole::{IngestError, IngestionPipeline, RabbitHole, UploadedFile};

use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Engine stub that records every memorized chunk.
struct MemoEngine {
    chunks: Mutex<Vec<String>>,
}

impl MemoEngine {
    fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ConversationEngine for MemoEngine {
    async fn message(&self, _text: &str) -> Result<Value, EngineError> {
        Ok(json!({}))
    }

    async fn memorize(&self, chunk: &str) -> Result<(), EngineError> {
        self.chunks.lock().await.push(chunk.to_string());
        Ok(())
    }
}

fn plain_file(payload: &[u8]) -> UploadedFile {
    UploadedFile {
        filename: "note.txt".to_string(),
        content_type: "text/plain".to_string(),
        bytes: Bytes::copy_from_slice(payload),
    }
}

#[tokio::test]
async fn test_plain_text_feeds_engine_memory() {
    let engine = Arc::new(MemoEngine::new());
    let file = plain_file(b"White Rabbit was late.\n\nThe Queen was furious.");

    RabbitHole
        .ingest(file, engine.clone())
        .await
        .expect("ingestion failed");

    let chunks = engine.chunks.lock().await;
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].contains("White Rabbit"));
    assert!(chunks[0].contains("Queen"));
}

#[tokio::test]
async fn test_large_text_is_split_into_ordered_chunks() {
    let engine = Arc::new(MemoEngine::new());
    let first = format!("FIRST {}", "a ".repeat(1200));
    let second = format!("SECOND {}", "b ".repeat(1200));
    let file = plain_file(format!("{}\n\n{}", first, second).as_bytes());

    RabbitHole.ingest(file, engine.clone()).await.unwrap();

    let chunks = engine.chunks.lock().await;
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].starts_with("FIRST"));
    assert!(chunks[1].starts_with("SECOND"));
}

#[tokio::test]
async fn test_traversal_filename_cannot_touch_files_outside_temp_dir() {
    // Point the temp dir at an inner directory and plant a file one level
    // above it, where a path built from the filename would land
    let base = std::env::temp_dir().join(format!("catgate-test-{}", uuid::Uuid::new_v4()));
    let inner = base.join("tmp");
    std::fs::create_dir_all(&inner).unwrap();
    let victim = base.join("victim.txt");
    std::fs::write(&victim, "precious").unwrap();
    std::env::set_var("TMPDIR", &inner);

    let engine = Arc::new(MemoEngine::new());
    let file = UploadedFile {
        filename: "../victim.txt".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: Bytes::from_static(b"not a real pdf"),
    };

    // Extraction of garbage bytes fails; the point is what it touched
    let _ = RabbitHole.ingest(file, engine).await;

    assert!(victim.exists());
    assert_eq!(std::fs::read_to_string(&victim).unwrap(), "precious");

    std::env::remove_var("TMPDIR");
    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test]
async fn test_non_utf8_text_is_rejected() {
    let engine = Arc::new(MemoEngine::new());
    let file = plain_file(&[0xff, 0xfe, 0x00]);

    let err = RabbitHole.ingest(file, engine.clone()).await.unwrap_err();

    assert!(matches!(err, IngestError::InvalidText(_)));
    assert!(engine.chunks.lock().await.is_empty());
}

#[tokio::test]
async fn test_blank_text_has_nothing_to_ingest() {
    let engine = Arc::new(MemoEngine::new());
    let file = plain_file(b"  \n\n   \n\n");

    let err = RabbitHole.ingest(file, engine.clone()).await.unwrap_err();

    assert!(matches!(err, IngestError::Empty(_)));
    assert!(engine.chunks.lock().await.is_empty());
}
