//! Document text extraction for docchat
//!
//! Turns an uploaded file (.txt, .pdf, .docx) into plain text suitable for
//! injection as document context. The heavy lifting is delegated: PDFs go
//! through `pdf-extract`, DOCX bodies are read out of the OOXML zip archive.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for extraction operations
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("Document contains no extractable text")]
    EmptyDocument,

    #[error("File is too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Supported document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Determine the kind from a file name, by extension
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" | "text" | "log" | "csv" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// An extracted document ready for context injection
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Original file name
    pub file_name: String,
    /// Extracted plain text
    pub text: String,
    /// Detected kind
    pub kind: DocumentKind,
}

/// Extract text from a file on disk, enforcing the size limit
pub fn extract_file(path: &Path, max_bytes: u64) -> ExtractResult<ExtractedDocument> {
    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(ExtractError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;
    extract_bytes(&file_name, &bytes)
}

/// Extract text from an in-memory upload
pub fn extract_bytes(file_name: &str, bytes: &[u8]) -> ExtractResult<ExtractedDocument> {
    let kind = DocumentKind::from_name(file_name)
        .ok_or_else(|| ExtractError::UnsupportedFormat(file_name.to_string()))?;

    let text = match kind {
        DocumentKind::Text => extract_plain_text(bytes),
        DocumentKind::Pdf => extract_pdf_text(bytes)?,
        DocumentKind::Docx => extract_docx_text(bytes)?,
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }

    debug!(
        file_name,
        chars = text.len(),
        "extracted document text"
    );

    Ok(ExtractedDocument {
        file_name: file_name.to_string(),
        text,
        kind,
    })
}

fn extract_plain_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn extract_pdf_text(bytes: &[u8]) -> ExtractResult<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!("PDF extraction failed: {e}");
            Err(ExtractError::Pdf(e.to_string()))
        }
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static PARA_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</w:p>").expect("valid regex"));
static BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:(br|cr)\s*/>").expect("valid regex"));
static TAB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").expect("valid regex"));

fn extract_docx_text(bytes: &[u8]) -> ExtractResult<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("missing word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    // Paragraph ends and explicit breaks become newlines before markup is stripped
    let xml = PARA_END_RE.replace_all(&xml, "\n");
    let xml = BREAK_RE.replace_all(&xml, "\n");
    let xml = TAB_RE.replace_all(&xml, "\t");
    let text = TAG_RE.replace_all(&xml, "");

    Ok(decode_entities(&text))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
