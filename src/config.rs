/// Gateway-wide configuration constants

// Fixed payload returned by the liveness check
pub const STATUS_MESSAGE: &str = "We're all mad here, dear!";

// MIME types the Rabbit Hole accepts for upload
pub const ADMITTED_MIME_TYPES: [&str; 2] = ["text/plain", "application/pdf"];

// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

// Bound on queued-but-not-yet-ingested uploads
pub const INGEST_QUEUE_CAPACITY: usize = 64;

// Defaults for the remote engine client
pub const DEFAULT_ENGINE_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_ENGINE_MODEL: &str = "mistral";
pub const ENGINE_REQUEST_TIMEOUT_SECS: u64 = 120;

// Character budget for a single memorized chunk
pub const INGEST_CHUNK_SIZE: usize = 2000;
