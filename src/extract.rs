//! Plain-text extraction for uploaded and scanned documents.
//!
//! PDFs are read page by page. Every text-showing operator (`Tj`, `TJ`,
//! `'`, `"`) in a page's content stream is one run; runs are trimmed, empty
//! runs dropped, and every run in document order is joined with a single
//! space. Text-like files are decoded as UTF-8 (lossy).

use lopdf::content::Operation;
use lopdf::Object;
use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Guesses a content type from a file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" | "text" | "log" | "csv" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

pub fn is_pdf(path: &Path) -> bool {
    content_type_for(path) == Some(MIME_PDF)
}

/// Extracts plain text from file bytes of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Per-page text runs of a PDF, in page order.
///
/// Pages whose strings do not decode as single-byte or UTF-16 text (CID
/// fonts) fall back to lopdf's font-aware extraction, one run per line.
pub fn pdf_page_runs(bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let content = doc
            .get_and_decode_page_content(page_id)
            .map_err(|e| ExtractError::Pdf(format!("page {}: {}", page_number, e)))?;

        let mut runs = content_runs(&content.operations);
        if runs.is_empty() || runs.iter().any(|run| looks_like_glyph_ids(run)) {
            let text = doc
                .extract_text(&[page_number])
                .map_err(|e| ExtractError::Pdf(format!("page {}: {}", page_number, e)))?;
            runs = split_runs(&text);
        }
        pages.push(runs);
    }
    Ok(pages)
}

/// TJ offsets below this (in thousandths of an em) are word gaps.
const TJ_WORD_GAP: f32 = -200.0;

fn content_runs(operations: &[Operation]) -> Vec<String> {
    operations
        .iter()
        .filter_map(|op| {
            let text = match op.operator.as_str() {
                "Tj" | "'" => op.operands.first().map(decode_string)?,
                "\"" => op.operands.get(2).map(decode_string)?,
                "TJ" => match op.operands.first()? {
                    Object::Array(items) => decode_tj_array(items),
                    other => decode_string(other),
                },
                _ => return None,
            };
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

fn decode_tj_array(items: &[Object]) -> String {
    let mut out = String::new();
    for item in items {
        match item {
            Object::Integer(n) if (*n as f32) < TJ_WORD_GAP => out.push(' '),
            Object::Real(n) if (*n as f32) < TJ_WORD_GAP => out.push(' '),
            other => out.push_str(&decode_string(other)),
        }
    }
    out
}

/// PDF text strings: UTF-16BE with a byte-order mark, otherwise one byte
/// per character.
fn decode_string(obj: &Object) -> String {
    let Object::String(bytes, _) = obj else {
        return String::new();
    };
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn looks_like_glyph_ids(run: &str) -> bool {
    let control = run.chars().filter(|c| c.is_control()).count();
    control * 4 > run.chars().count()
}

pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_page_runs(bytes)?;
    let joined = join_runs(&pages);
    if !joined.is_empty() {
        return Ok(joined);
    }

    // Some font encodings defeat per-page decoding; retry on the whole document.
    let whole =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(split_runs(&whole).join(" "))
}

fn split_runs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|run| !run.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_runs(pages: &[Vec<String>]) -> String {
    pages
        .iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
