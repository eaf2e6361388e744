use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a readable PDF: {0}")]
    Invalid(String),
}

/// Turns uploaded document bytes into plain text.
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Text-layer extraction through `pdf-extract`. Scanned PDFs come back empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(ExtractError::Invalid("missing %PDF header".into()));
        }
        let text = unwind_to_error(|| {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Invalid(e.to_string()))
        })?;
        Ok(join_pages(&text))
    }
}

// pdf-extract panics on some malformed files instead of returning an error
fn unwind_to_error<T>(f: impl FnOnce() -> Result<T, ExtractError>) -> Result<T, ExtractError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ExtractError::Invalid(format!("parser panicked: {}", panic_message(&*payload)))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

// pdf-extract separates pages with form feeds
fn join_pages(raw: &str) -> String {
    raw.split('\x0C')
        .map(str::trim_end)
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feeds_become_paragraph_breaks() {
        assert_eq!(join_pages("page one\n\x0Cpage two  \x0C\x0C"), "page one\n\npage two");
        assert_eq!(join_pages("   \x0C  "), "");
    }

    #[test]
    fn parser_panics_become_invalid_pdf_errors() {
        let err = unwind_to_error::<String>(|| panic!("unexpected token in xref")).unwrap_err();
        let ExtractError::Invalid(msg) = err;
        assert_eq!(msg, "parser panicked: unexpected token in xref");

        let id = 7;
        let err = unwind_to_error::<String>(|| panic!("object {id} missing")).unwrap_err();
        assert!(err.to_string().ends_with("parser panicked: object 7 missing"));

        assert_eq!(unwind_to_error(|| Ok("text".to_string())).unwrap(), "text");
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        let err = PdfTextExtractor.extract(b"hello world").unwrap_err();
        assert!(matches!(err, ExtractError::Invalid(_)));
    }
}
