use crate::embeddings::Embedder;
use crate::generation::AnswerGenerator;
use crate::index::{FlatL2Index, VectorIndex};
use crate::models::{Answer, RetrievalOptions};
use crate::retriever::Retriever;
use tracing::{info, warn};

pub const INDEX_NOT_BUILT_MESSAGE: &str =
    "Vector store not initialized. Build the index from your study material first.";
pub const NO_RESULTS_MESSAGE: &str = "No relevant information found in study material.";

const RAW_CONTEXT_PREVIEW_CHARS: usize = 500;

/// Retrieval followed by generation. Either half may be missing: without an index every
/// question is "not found", without a generator the raw passages are returned.
pub struct RagPipeline<'e, E, G, V = FlatL2Index>
where
    E: Embedder,
    G: AnswerGenerator,
    V: VectorIndex,
{
    retriever: Option<Retriever<'e, E, V>>,
    generator: Option<G>,
}

impl<'e, E, G, V> RagPipeline<'e, E, G, V>
where
    E: Embedder,
    G: AnswerGenerator,
    V: VectorIndex,
{
    pub fn new(retriever: Option<Retriever<'e, E, V>>, generator: Option<G>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn has_index(&self) -> bool {
        self.retriever.is_some()
    }

    pub async fn answer_question(&self, query: &str, options: &RetrievalOptions) -> Answer {
        let Some(retriever) = &self.retriever else {
            warn!("question asked without a built index");
            return Answer::not_found(INDEX_NOT_BUILT_MESSAGE);
        };

        let sources = match retriever.retrieve_with(query, options) {
            Ok(sources) => sources,
            Err(error) => {
                warn!(%error, "retrieval failed");
                return Answer::not_found(format!("Error during search: {error}"));
            }
        };

        if sources.is_empty() {
            info!(query, "no chunk passed the score threshold");
            return Answer::not_found(NO_RESULTS_MESSAGE);
        }

        let context = sources
            .iter()
            .map(|source| source.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let answer = match &self.generator {
            Some(generator) => generator.generate_answer(query, &context).await,
            None => {
                let preview: String = context.chars().take(RAW_CONTEXT_PREVIEW_CHARS).collect();
                format!("LLM not available. Here are the relevant sections:\n\n{preview}")
            }
        };

        Answer {
            found: true,
            answer,
            sources,
        }
    }
}
