use serde::{Deserialize, Serialize};

/// One page of extracted text from a source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: String,
    pub page: u32,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page,
        }
    }
}

/// A word-bounded run of sentences from one page. `chunk_id` is 1-based within that page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
    pub chunk_id: u32,
}

impl Chunk {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A matched chunk plus its squared L2 distance to the query. Lower is closer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub text: String,
    pub source: String,
    pub page: u32,
    pub chunk_id: u32,
    pub score: f32,
}

impl QueryResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            page: chunk.page,
            chunk_id: chunk.chunk_id,
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitterOptions {
    /// Target words per chunk.
    pub chunk_size: usize,
    /// Words carried into the next chunk.
    pub chunk_overlap: usize,
}

impl Default for SplitterOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub score_threshold: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            score_threshold: 1.5,
        }
    }
}

/// Outcome of one question. `found == false` means nothing usable came back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub found: bool,
    pub answer: String,
    pub sources: Vec<QueryResult>,
}

impl Answer {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            answer: message.into(),
            sources: Vec::new(),
        }
    }
}
