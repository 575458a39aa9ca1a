use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid splitter config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model failed to load: {0}")]
    ModelInit(String),

    #[error("embedding inference failed: {0}")]
    Inference(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    OutputCount { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector at position {position} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("vector count {vectors} does not match metadata count {metadata}")]
    CountMismatch { vectors: usize, metadata: usize },

    #[error("index was built with embedding model `{expected}`, query embedder is `{actual}`")]
    ModelMismatch { expected: String, actual: String },

    #[error("unsupported vector dimension {0}")]
    UnsupportedDimension(usize),

    #[error("model id is longer than {max} bytes: {model_id}")]
    ModelIdTooLong { model_id: String, max: usize },

    #[error("index not built: {0} is missing")]
    IndexNotFound(PathBuf),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("api key is not configured")]
    MissingApiKey,

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service returned {status}: {details}")]
    Status { status: u16, details: String },

    #[error("invalid response from generation service: {0}")]
    BadResponse(String),
}

impl GenerationError {
    /// Rate limiting is the only failure class worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            GenerationError::Status { status, details } => {
                *status == 429 || details.to_lowercase().contains("rate")
            }
            GenerationError::Http(error) => error
                .status()
                .is_some_and(|status| status.as_u16() == 429),
            _ => false,
        }
    }
}
