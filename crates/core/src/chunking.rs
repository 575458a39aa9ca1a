use crate::error::IngestError;
use crate::models::{Chunk, Document, SplitterOptions};
use regex::Regex;
use tracing::debug;

const SENTENCE_BOUNDARY: &str = r"[.!?]\s+";

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    options: SplitterOptions,
    boundary: Regex,
}

impl SplitterOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl TextSplitter {
    pub fn new(options: SplitterOptions) -> Result<Self, IngestError> {
        options.validate()?;
        Ok(Self {
            options,
            boundary: Regex::new(SENTENCE_BOUNDARY)?,
        })
    }

    pub fn options(&self) -> SplitterOptions {
        self.options
    }

    /// Splits after `.`, `!` or `?` followed by whitespace. The punctuation stays with its sentence.
    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in self.boundary.find_iter(&normalized) {
            // punctuation is a single ASCII byte
            let end = boundary.start() + 1;
            sentences.push(normalized[start..end].trim().to_string());
            start = boundary.end();
        }
        sentences.push(normalized[start..].trim().to_string());

        sentences.retain(|sentence| !sentence.is_empty());
        sentences
    }

    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            let texts = self.split_text(&document.text);
            debug!(
                source = %document.source,
                page = document.page,
                chunk_count = texts.len(),
                "split page"
            );

            chunks.extend(texts.into_iter().enumerate().map(|(position, text)| Chunk {
                text,
                source: document.source.clone(),
                page: document.page,
                chunk_id: position as u32 + 1,
            }));
        }

        chunks
    }

    /// Greedy sentence packing. A chunk closes when the next sentence would push it past
    /// `chunk_size`; the closed chunk's trailing sentences (up to `chunk_overlap` words)
    /// seed the next one. A single sentence longer than `chunk_size` is never cut.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let sentences = self.split_sentences(text);
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_words = 0usize;

        for sentence in &sentences {
            let sentence_words = word_count(sentence);

            if current_words + sentence_words > self.options.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));

                let (overlap, overlap_words) = self.overlap_tail(&current);
                current = overlap;
                current_words = overlap_words;
            }

            current.push(sentence);
            current_words += sentence_words;
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    fn overlap_tail<'a>(&self, closed: &[&'a str]) -> (Vec<&'a str>, usize) {
        let mut taken = 0usize;
        let mut words = 0usize;

        for sentence in closed.iter().rev() {
            let sentence_words = word_count(sentence);
            if words + sentence_words > self.options.chunk_overlap {
                break;
            }
            words += sentence_words;
            taken += 1;
        }

        (closed[closed.len() - taken..].to_vec(), words)
    }
}
