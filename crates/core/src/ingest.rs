use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::{Document, IngestError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

pub fn load_documents_best_effort(folder: &Path) -> Result<LoadReport, IngestError> {
    load_documents_with(folder, &LopdfExtractor)
}

/// Unreadable files are recorded and skipped; only an empty folder is an error.
pub fn load_documents_with(
    folder: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<LoadReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    info!(folder = %folder.display(), file_count = files.len(), "loading pdfs");

    let mut report = LoadReport::default();
    for path in files {
        match extractor.extract_pages(&path) {
            Ok(pages) => {
                info!(path = %path.display(), page_count = pages.len(), "extracted pdf");
                report.documents.extend(pages);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipping pdf");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, load_documents_best_effort, load_documents_with};
    use crate::extractor::PdfExtractor;
    use crate::{Document, IngestError};
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    struct NamedPageExtractor;

    impl PdfExtractor for NamedPageExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            if name.starts_with("bad") {
                return Err(IngestError::PdfParse("no xref".to_string()));
            }
            Ok(vec![
                Document::new(format!("{name} first."), name, 1),
                Document::new(format!("{name} second."), name, 2),
            ])
        }
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"not a pdf")?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn loading_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_documents_best_effort(dir.path());
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn best_effort_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report = load_documents_best_effort(dir.path())?;

        assert_eq!(report.documents.len(), 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn pages_keep_file_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        for name in ["b.pdf", "a.pdf", "bad.pdf"] {
            fs::write(dir.path().join(name), b"%PDF-1.4")?;
        }

        let report = load_documents_with(dir.path(), &NamedPageExtractor)?;
        let order: Vec<(&str, u32)> = report
            .documents
            .iter()
            .map(|document| (document.source.as_str(), document.page))
            .collect();

        assert_eq!(order, vec![("a.pdf", 1), ("a.pdf", 2), ("b.pdf", 1), ("b.pdf", 2)]);
        assert_eq!(report.skipped_files.len(), 1);
        Ok(())
    }
}
