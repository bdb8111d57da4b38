//! Document text extraction

use std::path::Path;

use super::{DatasetError, DatasetResult};

const PAGE_BREAK: char = '\u{000C}';

/// Extract the text of a PDF, one newline between non-empty pages
pub fn extract_pdf_text(path: &Path) -> DatasetResult<String> {
    let raw = pdf_extract::extract_text(path).map_err(|e| DatasetError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let text = join_pages(&raw);
    tracing::debug!(
        path = %path.display(),
        chars = text.len(),
        "Extracted PDF text"
    );
    Ok(text)
}

/// Extract text from an exam document.
///
/// `.txt` files are taken as already-extracted text; anything else is read
/// as a PDF. A missing file is reported before any parsing starts.
pub fn extract_document_text(path: &Path) -> DatasetResult<String> {
    if !path.exists() {
        return Err(DatasetError::MissingInput(path.to_path_buf()));
    }

    let is_text = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);

    if is_text {
        Ok(join_pages(&std::fs::read_to_string(path)?))
    } else {
        extract_pdf_text(path)
    }
}

/// Drop blank pages and join the rest with newlines
fn join_pages(raw: &str) -> String {
    raw.split(PAGE_BREAK)
        .map(|page| page.replace('\u{0000}', ""))
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
