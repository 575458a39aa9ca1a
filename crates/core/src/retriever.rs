use crate::embeddings::Embedder;
use crate::error::{EmbedError, IndexError};
use crate::index::{FlatL2Index, VectorIndex};
use crate::models::{QueryResult, RetrievalOptions};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Read-only once constructed; any number of `retrieve` calls may share it.
pub struct Retriever<'e, E: Embedder, V: VectorIndex = FlatL2Index> {
    embedder: &'e E,
    index: V,
}

impl<'e, E: Embedder> Retriever<'e, E, FlatL2Index> {
    /// Loads the persisted artifact pair. A missing pair surfaces as `IndexNotFound`; an index
    /// built by another embedding model is refused even when the widths agree.
    pub fn open(index_dir: &Path, embedder: &'e E) -> Result<Self, IndexError> {
        let index = FlatL2Index::load(index_dir)?;
        if index.dimension() != embedder.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimensions(),
                position: 0,
            });
        }
        if index.model_id() != embedder.model_id() {
            return Err(IndexError::ModelMismatch {
                expected: index.model_id().to_string(),
                actual: embedder.model_id().to_string(),
            });
        }
        Ok(Self::new(embedder, index))
    }
}

impl<'e, E: Embedder, V: VectorIndex> Retriever<'e, E, V> {
    pub fn new(embedder: &'e E, index: V) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    /// Top-`top_k` search, then keep results with `score < score_threshold` in ranked order.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<QueryResult>, RetrieveError> {
        if query.trim().is_empty() || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query)?;
        let candidates = self.index.search(&query_vector, top_k)?;
        let candidate_count = candidates.len();

        let results: Vec<QueryResult> = candidates
            .into_iter()
            .filter(|result| result.score < score_threshold)
            .collect();

        debug!(
            top_k,
            score_threshold,
            candidates = candidate_count,
            kept = results.len(),
            "retrieved"
        );
        Ok(results)
    }

    pub fn retrieve_with(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<QueryResult>, RetrieveError> {
        self.retrieve(query, options.top_k, options.score_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::IndexBuilder;
    use crate::chunking::TextSplitter;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{Chunk, Document, SplitterOptions};
    use tempfile::tempdir;

    /// Embeds the leading number of the text onto a line, so distances are easy to read.
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn model_id(&self) -> &str {
            "axis"
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            let value = text
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<f32>().ok())
                .unwrap_or(0.0);
            Ok(vec![value])
        }
    }

    /// Same width as the n-gram embedder, different vector space.
    struct OtherModelEmbedder;

    impl Embedder for OtherModelEmbedder {
        fn model_id(&self) -> &str {
            "other-model"
        }

        fn dimensions(&self) -> usize {
            crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS
        }

        fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.0; self.dimensions()])
        }
    }

    fn axis_index() -> FlatL2Index {
        let mut index = FlatL2Index::new(1).with_model("axis");
        let chunks: Vec<Chunk> = (0..5)
            .map(|position| Chunk {
                text: format!("{position} marker"),
                source: "axis.pdf".to_string(),
                page: 1,
                chunk_id: position + 1,
            })
            .collect();
        let vectors: Vec<Vec<f32>> = (0..5).map(|position| vec![position as f32]).collect();
        index.add(&vectors, &chunks).expect("valid batch");
        index
    }

    #[test]
    fn threshold_is_strict_and_keeps_order() -> Result<(), Box<dyn std::error::Error>> {
        let retriever = Retriever::new(&AxisEmbedder, axis_index());

        // distances from 0: 0, 1, 4, 9, 16
        let results = retriever.retrieve("0", 5, 4.0)?;
        let ids: Vec<u32> = results.iter().map(|result| result.chunk_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(results[1].score, 1.0);
        Ok(())
    }

    #[test]
    fn raising_threshold_only_adds_results() -> Result<(), Box<dyn std::error::Error>> {
        let retriever = Retriever::new(&AxisEmbedder, axis_index());
        let search = retriever.index().search(&[2.0], 5)?;

        let mut previous: Vec<QueryResult> = Vec::new();
        for threshold in [0.5f32, 1.5, 4.5, 100.0] {
            let results = retriever.retrieve("2", 5, threshold)?;
            assert!(previous.iter().all(|kept| results.contains(kept)));

            let expected: Vec<QueryResult> = search
                .iter()
                .filter(|result| result.score < threshold)
                .cloned()
                .collect();
            assert_eq!(results, expected);
            previous = results;
        }
        assert_eq!(previous.len(), 5);
        Ok(())
    }

    #[test]
    fn top_k_bounds_results() -> Result<(), Box<dyn std::error::Error>> {
        let retriever = Retriever::new(&AxisEmbedder, axis_index());
        assert_eq!(retriever.retrieve("4", 2, f32::MAX)?.len(), 2);
        assert!(retriever.retrieve("4", 0, f32::MAX)?.is_empty());
        Ok(())
    }

    #[test]
    fn empty_index_or_blank_query_returns_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let empty = Retriever::new(&AxisEmbedder, FlatL2Index::new(1));
        assert!(empty.retrieve("1", 3, 10.0)?.is_empty());

        let retriever = Retriever::new(&AxisEmbedder, axis_index());
        assert!(retriever.retrieve("   ", 3, 10.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn open_reports_missing_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        assert!(matches!(
            Retriever::open(dir.path(), &embedder),
            Err(IndexError::IndexNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn open_rejects_embedder_of_other_width() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        axis_index().save(dir.path())?;
        let embedder = CharacterNgramEmbedder { dimensions: 8 };
        assert!(matches!(
            Retriever::open(dir.path(), &embedder),
            Err(IndexError::DimensionMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn built_index_answers_its_own_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        let splitter = TextSplitter::new(SplitterOptions {
            chunk_size: 8,
            chunk_overlap: 3,
        })?;
        let documents = vec![
            Document::new(
                "Recursion is a function calling itself. It needs a base case.",
                "ds.pdf",
                2,
            ),
            Document::new(
                "Hashing maps keys to buckets. Collisions are resolved by chaining.",
                "ds.pdf",
                7,
            ),
        ];

        let report = IndexBuilder::new(splitter, &embedder).build(&documents)?;
        report.index.save(dir.path())?;

        let retriever = Retriever::open(dir.path(), &embedder)?;
        let target = retriever.index().chunks()[0].clone();
        let results = retriever.retrieve(&target.text, 3, 1.5)?;

        assert_eq!(results[0].chunk_id, target.chunk_id);
        assert_eq!(results[0].page, target.page);
        assert_eq!(results[0].score, 0.0);
        Ok(())
    }

    #[test]
    fn open_rejects_index_from_another_model_of_same_width() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        let splitter = TextSplitter::new(SplitterOptions::default())?;
        let documents = vec![Document::new("A heap keeps its minimum at the root.", "ds.pdf", 1)];
        IndexBuilder::new(splitter, &embedder)
            .build(&documents)?
            .index
            .save(dir.path())?;

        match Retriever::open(dir.path(), &OtherModelEmbedder) {
            Err(IndexError::ModelMismatch { expected, actual }) => {
                assert_eq!(expected, crate::embeddings::NGRAM_MODEL_ID);
                assert_eq!(actual, "other-model");
            }
            Err(other) => panic!("expected model mismatch, got {other}"),
            Ok(_) => panic!("index opened with a different embedding model"),
        }

        assert!(Retriever::open(dir.path(), &embedder).is_ok());
        Ok(())
    }
}
