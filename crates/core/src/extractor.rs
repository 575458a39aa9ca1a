use crate::error::IngestError;
use crate::models::Document;
use lopdf::Document as PdfDocument;
use std::path::Path;

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Document>, IngestError>;
}

/// Plain text-layer extraction. Blank pages are dropped; a file with no text at all is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

        let pdf =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in pdf.get_pages() {
            let text = pdf
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            let text = text.trim();
            if !text.is_empty() {
                pages.push(Document::new(text, source, page_no));
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Writes a single-page PDF whose text layer holds `text`.
#[cfg(test)]
pub(crate) fn write_text_pdf(path: &Path, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let font_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = pdf.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_text_pdf, LopdfExtractor, PdfExtractor};
    use crate::error::IngestError;
    use crate::models::Document;
    use std::path::Path;

    struct FixedExtractor;

    impl PdfExtractor for FixedExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
            Ok(vec![Document::new("Page one.", path.display().to_string(), 1)])
        }
    }

    #[test]
    fn extractor_trait_is_object_safe() {
        let extractor: Box<dyn PdfExtractor> = Box::new(FixedExtractor);
        let pages = extractor
            .extract_pages(Path::new("notes.pdf"))
            .expect("fixed extractor never fails");
        assert_eq!(pages[0].source, "notes.pdf");
    }

    #[test]
    fn broken_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(
            LopdfExtractor.extract_pages(&path),
            Err(IngestError::PdfParse(_))
        ));
        Ok(())
    }

    #[test]
    fn text_layer_becomes_one_document_per_page() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("graphs.pdf");
        write_text_pdf(&path, "A tree is a connected acyclic graph.")?;

        let pages = LopdfExtractor.extract_pages(&path)?;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, "graphs.pdf");
        assert_eq!(pages[0].page, 1);
        assert!(pages[0].text.contains("acyclic graph"), "{:?}", pages[0].text);
        Ok(())
    }
}
