use crate::error::ExtractError;
use crate::models::{ExtractedText, ExtractionWarning, PdfSource};
use lopdf::Document;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Every page in order; a page without a text layer yields an empty string.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(format!("page {page_no}: {error}")))?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenates the text of every readable file. A file that fails to parse
/// is logged and reported as a warning; the rest of the batch still runs.
pub fn extract_pdf_text(sources: &[PdfSource], extractor: &dyn PdfExtractor) -> ExtractedText {
    let mut extracted = ExtractedText::default();

    for source in sources {
        match extractor.extract_pages(&source.bytes) {
            Ok(pages) => {
                let before = extracted.text.len();
                for page in pages {
                    extracted.text.push_str(&page.text);
                }
                extracted.files_read += 1;
                info!(
                    file = %source.name,
                    bytes = extracted.text.len() - before,
                    "extracted pdf text"
                );
            }
            Err(error) => {
                warn!(file = %source.name, %error, "skipping unreadable pdf");
                extracted.warnings.push(ExtractionWarning {
                    file_name: source.name.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedExtractor;

    impl PdfExtractor for ScriptedExtractor {
        fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
            let body = String::from_utf8_lossy(bytes);
            if body == "corrupt" {
                return Err(ExtractError::PdfParse("bad xref".to_string()));
            }
            Ok(body
                .split('|')
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn pages_are_concatenated_without_separator() {
        let sources = vec![
            PdfSource::new("a.pdf", "one\n|two\n"),
            PdfSource::new("b.pdf", "three\n"),
        ];
        let extracted = extract_pdf_text(&sources, &ScriptedExtractor);

        assert_eq!(extracted.text, "one\ntwo\nthree\n");
        assert_eq!(extracted.files_read, 2);
        assert!(extracted.warnings.is_empty());
    }

    #[test]
    fn corrupt_file_becomes_a_single_warning() {
        let sources = vec![
            PdfSource::new("first.pdf", "alpha\n"),
            PdfSource::new("second.pdf", "corrupt"),
            PdfSource::new("third.pdf", "gamma\n"),
        ];
        let extracted = extract_pdf_text(&sources, &ScriptedExtractor);

        assert_eq!(extracted.text, "alpha\ngamma\n");
        assert_eq!(extracted.warnings.len(), 1);
        assert_eq!(extracted.warnings[0].file_name, "second.pdf");
        assert!(extracted.warnings[0].to_string().contains("second.pdf"));
    }

    #[test]
    fn image_only_pages_contribute_nothing() {
        let sources = vec![PdfSource::new("scan.pdf", "|")];
        let extracted = extract_pdf_text(&sources, &ScriptedExtractor);

        assert_eq!(extracted.text, "");
        assert_eq!(extracted.files_read, 1);
    }

    #[test]
    fn lopdf_rejects_garbage_bytes() {
        let result = LopdfExtractor.extract_pages(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(ExtractError::PdfParse(_))));
    }
}
