use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use study_rag_core::{
    build_index_from_folder, CharacterNgramEmbedder, Embedder, GroqClient, IndexError,
    QueryResult, RagPipeline, RetrievalOptions, Retriever, SplitterOptions,
    DEFAULT_EMBED_BATCH_SIZE,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "study-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder that contains the study PDFs (searched recursively).
    #[arg(long, env = "STUDY_RAG_DATA_DIR", default_value = "data/raw")]
    data_dir: PathBuf,

    /// Folder holding the persisted vector and chunk artifacts.
    #[arg(long, env = "STUDY_RAG_INDEX_DIR", default_value = "data/processed")]
    index_dir: PathBuf,

    /// Embedding backend. Build and query must use the same one.
    #[arg(long, value_enum, default_value_t)]
    embedder: EmbedderKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Hashed character trigrams; no model download.
    Ngram,
    /// all-MiniLM-L6-v2 sentence embeddings (requires the `fastembed` feature).
    Minilm,
}

impl Default for EmbedderKind {
    fn default() -> Self {
        if cfg!(feature = "fastembed") {
            EmbedderKind::Minilm
        } else {
            EmbedderKind::Ngram
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Split, embed and index every PDF in the data folder.
    Build {
        /// Target words per chunk.
        #[arg(long, default_value_t = SplitterOptions::default().chunk_size)]
        chunk_size: usize,
        /// Words carried over into the next chunk.
        #[arg(long, default_value_t = SplitterOptions::default().chunk_overlap)]
        chunk_overlap: usize,
        /// Chunks per embedding call.
        #[arg(long, default_value_t = DEFAULT_EMBED_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Print the ranked chunks for a query.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = RetrievalOptions::default().top_k)]
        top_k: usize,
        /// Keep results whose distance is strictly below this value.
        #[arg(long, default_value_t = RetrievalOptions::default().score_threshold)]
        score_threshold: f32,
    },
    /// Retrieve context and generate an exam-style answer.
    Ask {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = RetrievalOptions::default().top_k)]
        top_k: usize,
        #[arg(long, default_value_t = RetrievalOptions::default().score_threshold)]
        score_threshold: f32,
        /// Groq API key. Without it the raw passages are printed.
        #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
        groq_api_key: Option<String>,
        /// OpenAI-compatible API root.
        #[arg(long, env = "GROQ_BASE_URL", default_value = study_rag_core::generation::DEFAULT_BASE_URL)]
        groq_url: String,
        /// Chat model name.
        #[arg(long, default_value = study_rag_core::generation::DEFAULT_MODEL)]
        model: String,
    },
}

fn load_embedder(kind: EmbedderKind) -> anyhow::Result<Box<dyn Embedder>> {
    match kind {
        EmbedderKind::Ngram => Ok(Box::new(CharacterNgramEmbedder::default())),
        #[cfg(feature = "fastembed")]
        EmbedderKind::Minilm => Ok(Box::new(study_rag_core::MiniLmEmbedder::load()?)),
        #[cfg(not(feature = "fastembed"))]
        EmbedderKind::Minilm => Err(anyhow!("this binary was built without the `fastembed` feature")),
    }
}

/// `None` when the index has not been built yet; any other load failure is fatal.
fn open_retriever<'e>(
    index_dir: &Path,
    embedder: &'e Box<dyn Embedder>,
) -> anyhow::Result<Option<Retriever<'e, Box<dyn Embedder>>>> {
    match Retriever::open(index_dir, embedder) {
        Ok(retriever) => Ok(Some(retriever)),
        Err(IndexError::IndexNotFound(path)) => {
            warn!(path = %path.display(), "index not built");
            Ok(None)
        }
        Err(error @ IndexError::ModelMismatch { .. }) => Err(anyhow!(error)).context(
            "index was built with a different --embedder; rebuild it or pass the matching one",
        ),
        Err(error) => Err(anyhow!(error)).context(format!(
            "unable to load index from {}",
            index_dir.display()
        )),
    }
}

fn print_result(rank: usize, result: &QueryResult) {
    println!(
        "{rank}. score={:.4} source={} page={} chunk={}",
        result.score, result.source, result.page, result.chunk_id
    );
    println!("   {}", result.text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        embedder = ?cli.embedder,
        started_at = %Utc::now().to_rfc3339(),
        "study-rag boot"
    );

    let embedder = load_embedder(cli.embedder)?;

    match cli.command {
        Command::Build {
            chunk_size,
            chunk_overlap,
            batch_size,
        } => {
            let options = SplitterOptions {
                chunk_size,
                chunk_overlap,
            };
            options.validate()?;

            info!(
                data_dir = %cli.data_dir.display(),
                index_dir = %cli.index_dir.display(),
                batch_size,
                "building index"
            );
            let report = build_index_from_folder(
                &cli.data_dir,
                &cli.index_dir,
                options,
                &embedder,
                batch_size,
            )?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    cli.data_dir.display()
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            if report.chunk_count == 0 {
                println!("0 chunks indexed (no extractable text was found)");
            }

            println!(
                "{} chunks from {} pages indexed into {} at {}",
                report.chunk_count,
                report.document_count,
                cli.index_dir.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search {
            query,
            top_k,
            score_threshold,
        } => {
            let Some(retriever) = open_retriever(&cli.index_dir, &embedder)? else {
                println!(
                    "index not built: run `study-rag build` to create {}",
                    cli.index_dir.display()
                );
                return Ok(());
            };

            let results = retriever.retrieve(&query, top_k, score_threshold)?;
            println!("query: {query}");
            if results.is_empty() {
                println!("no relevant results (threshold {score_threshold})");
            }
            for (position, result) in results.iter().enumerate() {
                print_result(position + 1, result);
            }
        }
        Command::Ask {
            query,
            top_k,
            score_threshold,
            groq_api_key,
            groq_url,
            model,
        } => {
            let retriever = open_retriever(&cli.index_dir, &embedder)?;

            let generator = match groq_api_key {
                Some(key) => Some(GroqClient::new(key)?.with_base_url(&groq_url)?.with_model(model)),
                None => {
                    warn!("GROQ_API_KEY not set; answers will contain raw passages only");
                    None
                }
            };

            let pipeline = RagPipeline::new(retriever, generator);
            let options = RetrievalOptions {
                top_k,
                score_threshold,
            };
            let answer = pipeline.answer_question(&query, &options).await;

            if !answer.found {
                println!("{}", answer.answer);
                return Ok(());
            }

            println!("answer:\n{}\n", answer.answer);
            println!("sources:");
            for (position, source) in answer.sources.iter().enumerate() {
                print_result(position + 1, source);
            }
        }
    }

    Ok(())
}
