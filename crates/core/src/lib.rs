pub mod build;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod retriever;

pub use build::{build_index_from_folder, BuildReport, IndexBuilder};
pub use chunking::{normalize_whitespace, TextSplitter};
#[cfg(feature = "fastembed")]
pub use embeddings::MiniLmEmbedder;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBED_BATCH_SIZE,
    NGRAM_MODEL_ID,
};
pub use error::{BuildError, EmbedError, GenerationError, IndexError, IngestError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use generation::{build_prompt, AnswerGenerator, GroqClient, RetryPolicy};
pub use index::{FlatL2Index, VectorIndex, METADATA_FILE, VECTORS_FILE};
pub use ingest::{discover_pdf_files, load_documents_best_effort, load_documents_with, LoadReport, SkippedPdf};
pub use models::{Answer, Chunk, Document, QueryResult, RetrievalOptions, SplitterOptions};
pub use pipeline::RagPipeline;
pub use retriever::{RetrieveError, Retriever};
