use crate::chunking::TextSplitter;
use crate::embeddings::{ensure_batch_len, Embedder, DEFAULT_EMBED_BATCH_SIZE};
use crate::error::BuildError;
use crate::index::{FlatL2Index, VectorIndex};
use crate::ingest::{load_documents_best_effort, SkippedPdf};
use crate::models::{Document, SplitterOptions};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
pub struct BuildReport {
    pub index: FlatL2Index,
    pub document_count: usize,
    pub chunk_count: usize,
    /// Pages that produced no chunks.
    pub empty_documents: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

/// One-shot batch job: split, embed in batches, append to a fresh index.
pub struct IndexBuilder<'e, E: Embedder> {
    splitter: TextSplitter,
    embedder: &'e E,
    batch_size: usize,
}

impl<'e, E: Embedder> IndexBuilder<'e, E> {
    pub fn new(splitter: TextSplitter, embedder: &'e E) -> Self {
        Self {
            splitter,
            embedder,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn build(&self, documents: &[Document]) -> Result<BuildReport, BuildError> {
        let mut chunks = Vec::new();
        let mut empty_documents = 0usize;

        for document in documents {
            let page_chunks = self.splitter.split(std::slice::from_ref(document));
            if page_chunks.is_empty() {
                warn!(
                    source = %document.source,
                    page = document.page,
                    "page produced no chunks"
                );
                empty_documents += 1;
            }
            chunks.extend(page_chunks);
        }

        info!(
            document_count = documents.len(),
            chunk_count = chunks.len(),
            chunk_size = self.splitter.options().chunk_size,
            chunk_overlap = self.splitter.options().chunk_overlap,
            "split documents"
        );

        let mut index =
            FlatL2Index::new(self.embedder.dimensions()).with_model(self.embedder.model_id());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = ensure_batch_len(texts.len(), self.embedder.embed_batch(&texts)?)?;
            index.add(&vectors, batch)?;
            info!(embedded = index.len(), total = chunks.len(), "embedded batch");
        }

        if index.is_empty() {
            warn!("index has no vectors; nothing extractable was found");
        }

        Ok(BuildReport {
            index,
            document_count: documents.len(),
            chunk_count: chunks.len(),
            empty_documents,
            skipped_files: Vec::new(),
        })
    }
}

/// Loads every PDF under `data_dir`, builds the index and saves it to `index_dir`.
pub fn build_index_from_folder<E: Embedder>(
    data_dir: &Path,
    index_dir: &Path,
    options: SplitterOptions,
    embedder: &E,
    batch_size: usize,
) -> Result<BuildReport, BuildError> {
    let splitter = TextSplitter::new(options)?;
    let loaded = load_documents_best_effort(data_dir)?;

    let mut report = IndexBuilder::new(splitter, embedder)
        .with_batch_size(batch_size)
        .build(&loaded.documents)?;
    report.index.save(index_dir)?;
    report.skipped_files = loaded.skipped_files;

    Ok(report)
}
