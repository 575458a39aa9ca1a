use crate::error::EmbedError;

/// Output size of `all-MiniLM-L6-v2`; the n-gram embedder defaults to the same width.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

pub const NGRAM_MODEL_ID: &str = "ngram-trigram-v1";

/// Maps text into a fixed-width vector space. Identical input must give identical output.
pub trait Embedder {
    /// Names the vector space. Indexes record it, and only an embedder with the same id may query them.
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// One vector per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|text| self.embed_query(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed_query(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts)
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed_query(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed_batch(texts)
    }
}

/// Hashed character trigrams, L2-normalised. No model download; used offline and in tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        NGRAM_MODEL_ID
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0f32; self.dimensions()];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

pub(crate) fn ensure_batch_len(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::OutputCount {
            expected,
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// The only vector of a one-input batch.
#[cfg_attr(not(feature = "fastembed"), allow(dead_code))]
pub(crate) fn single_vector(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>, EmbedError> {
    match <[Vec<f32>; 1]>::try_from(vectors) {
        Ok([vector]) => Ok(vector),
        Err(vectors) => Err(EmbedError::OutputCount {
            expected: 1,
            actual: vectors.len(),
        }),
    }
}

#[cfg(feature = "fastembed")]
pub use minilm::MiniLmEmbedder;

#[cfg(feature = "fastembed")]
mod minilm {
    use super::{
        ensure_batch_len, single_vector, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
        DEFAULT_EMBED_BATCH_SIZE,
    };
    use crate::error::EmbedError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::path::PathBuf;
    use tracing::info;

    const MODEL_ID: &str = "all-MiniLM-L6-v2";

    /// `all-MiniLM-L6-v2` sentence embeddings through ONNX runtime.
    ///
    /// Loading pulls the model into the local cache on first use, so construct it once
    /// and hand out references.
    pub struct MiniLmEmbedder {
        model: TextEmbedding,
        batch_size: usize,
    }

    impl MiniLmEmbedder {
        pub fn load() -> Result<Self, EmbedError> {
            Self::load_with(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
        }

        pub fn load_cached(cache_dir: impl Into<PathBuf>) -> Result<Self, EmbedError> {
            Self::load_with(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_cache_dir(cache_dir.into()),
            )
        }

        fn load_with(options: InitOptions) -> Result<Self, EmbedError> {
            info!(model = MODEL_ID, "loading embedding model");
            let model = TextEmbedding::try_new(options.with_show_download_progress(false))
                .map_err(|error| EmbedError::ModelInit(error.to_string()))?;
            info!("embedding model loaded");

            Ok(Self {
                model,
                batch_size: DEFAULT_EMBED_BATCH_SIZE,
            })
        }

        pub fn with_batch_size(mut self, batch_size: usize) -> Self {
            self.batch_size = batch_size.max(1);
            self
        }
    }

    impl Embedder for MiniLmEmbedder {
        fn model_id(&self) -> &str {
            MODEL_ID
        }

        fn dimensions(&self) -> usize {
            DEFAULT_EMBEDDING_DIMENSIONS
        }

        fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            let vectors = self
                .model
                .embed(vec![text], None)
                .map_err(|error| EmbedError::Inference(error.to_string()))?;
            single_vector(vectors)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let vectors = self
                .model
                .embed(texts.to_vec(), Some(self.batch_size))
                .map_err(|error| EmbedError::Inference(error.to_string()))?;
            ensure_batch_len(texts.len(), vectors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_batch_len, single_vector, CharacterNgramEmbedder, Embedder, NGRAM_MODEL_ID};
    use crate::error::EmbedError;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_query("Binary search trees").unwrap();
        let second = embedder.embed_query("Binary search trees").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_query("abc").unwrap();
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn batch_matches_single_calls() {
        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        let texts = vec!["stack push pop".to_string(), "queue enqueue".to_string()];

        let batch = embedder.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed_query(&texts[0]).unwrap());
        assert_eq!(batch[1], embedder.embed_query(&texts[1]).unwrap());
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = CharacterNgramEmbedder { dimensions: 8 };
        assert_eq!(embedder.embed_query("").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn boxed_embedders_forward_calls() {
        let boxed: Box<dyn Embedder> = Box::new(CharacterNgramEmbedder { dimensions: 16 });
        assert_eq!(boxed.dimensions(), 16);
        assert_eq!(boxed.model_id(), NGRAM_MODEL_ID);
        assert_eq!(
            boxed.embed_query("heap").unwrap(),
            CharacterNgramEmbedder { dimensions: 16 }.embed_query("heap").unwrap()
        );
    }

    #[test]
    fn short_batches_are_rejected() {
        let result = ensure_batch_len(3, vec![vec![0.0]]);
        assert!(matches!(
            result,
            Err(EmbedError::OutputCount {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn single_vector_reports_actual_count() {
        assert_eq!(single_vector(vec![vec![1.0, 2.0]]).ok(), Some(vec![1.0, 2.0]));
        assert!(matches!(
            single_vector(Vec::new()),
            Err(EmbedError::OutputCount {
                expected: 1,
                actual: 0
            })
        ));
        assert!(matches!(
            single_vector(vec![vec![0.0], vec![1.0]]),
            Err(EmbedError::OutputCount {
                expected: 1,
                actual: 2
            })
        ));
    }
}
