//! PDF text extraction
//!
//! Decodes each page's content stream with lopdf and collects the shown strings.
//! Page count and file size are bounded by [`PdfParserSettings`].

use crate::config::{PdfParserSettings, Settings};
use crate::errors::{AppError, Result};
use lopdf::content::Content;
use lopdf::Object;
use std::path::Path;
use tracing::{debug, info, warn};

/// Text extracted from a PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPdf {
    pub text: String,
    /// Pages in the document
    pub page_count: usize,
    /// Pages actually read, at most `max_pages`
    pub pages_parsed: usize,
}

/// PDF parser with page and size limits
#[derive(Debug, Clone)]
pub struct PdfParserService {
    max_pages: usize,
    max_file_size_mb: u64,
    do_ocr: bool,
    do_table_structure: bool,
}

impl PdfParserService {
    pub fn new(settings: &PdfParserSettings) -> Self {
        info!(
            max_pages = settings.max_pages,
            max_file_size_mb = settings.max_file_size_mb,
            "PDF parser initialized"
        );

        Self {
            max_pages: settings.max_pages,
            max_file_size_mb: settings.max_file_size_mb,
            do_ocr: settings.do_ocr,
            do_table_structure: settings.do_table_structure,
        }
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    pub fn do_ocr(&self) -> bool {
        self.do_ocr
    }

    pub fn do_table_structure(&self) -> bool {
        self.do_table_structure
    }

    fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Parse a PDF on the blocking pool
    pub async fn parse_pdf(&self, path: &Path) -> Result<ParsedPdf> {
        let parser = self.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || parser.parse_pdf_blocking(&path))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("PDF parsing task failed: {}", e),
            })?
    }

    /// Parse a PDF on the current thread
    pub fn parse_pdf_blocking(&self, path: &Path) -> Result<ParsedPdf> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| parse_error(path, format!("Cannot read file: {}", e)))?;
        if !metadata.is_file() {
            return Err(parse_error(path, "Not a regular file"));
        }

        let limit = self.max_file_size_bytes();
        if metadata.len() > limit {
            return Err(AppError::PayloadTooLarge {
                size: metadata.len(),
                limit,
            });
        }

        let doc = lopdf::Document::load(path)
            .map_err(|e| parse_error(path, format!("Failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        let page_count = pages.len();
        let mut pages_parsed = 0;
        let mut text = String::new();

        debug!(page_count, max_pages = self.max_pages, "Extracting text from PDF");

        for (page_num, page_id) in pages.iter().take(self.max_pages) {
            pages_parsed += 1;
            let page_text = doc
                .get_page_content(*page_id)
                .and_then(|content| extract_text_from_content(&content));
            match page_text {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    warn!(page = page_num, error = %e, "Failed to read page content, skipping");
                }
            }
        }

        if text.trim().is_empty() {
            return Err(parse_error(path, "No text content extracted from PDF"));
        }

        let cleaned = clean_text(&text);

        debug!(
            pages_parsed,
            original_len = text.len(),
            cleaned_len = cleaned.len(),
            "Text extraction complete"
        );

        Ok(ParsedPdf {
            text: cleaned,
            page_count,
            pages_parsed,
        })
    }
}

/// Build the PDF parser described by the settings
pub fn make_pdf_parser_service(settings: &Settings) -> PdfParserService {
    PdfParserService::new(&settings.pdf_parser)
}

fn parse_error(path: &Path, message: impl Into<String>) -> AppError {
    AppError::PdfParse {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// TJ adjustments below this (thousandths of an em) read as a word gap
const WORD_GAP: f32 = -200.0;

/// Collect the strings shown between BT and ET
fn extract_text_from_content(content: &[u8]) -> lopdf::Result<String> {
    let content = Content::decode(content)?;
    let mut text = String::new();
    let mut in_text_block = false;

    for operation in &content.operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            _ if !in_text_block => {}
            "Tj" => push_shown(&mut text, operands.first()),
            "'" => {
                text.push(' ');
                push_shown(&mut text, operands.first());
            }
            "\"" => {
                text.push(' ');
                push_shown(&mut text, operands.get(2));
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => push_shown(&mut text, Some(item)),
                            adjustment if adjustment.as_float().is_ok_and(|gap| gap < WORD_GAP) => {
                                text.push(' ')
                            }
                            _ => {}
                        }
                    }
                }
            }
            // Moves to a new line or position
            "Td" | "TD" | "T*" | "Tm" => text.push(' '),
            _ => {}
        }
    }

    Ok(text)
}

fn push_shown(text: &mut String, operand: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = operand {
        text.push_str(&decode_string_bytes(bytes));
    }
}

/// UTF-16BE when the byte order mark is present, else UTF-8 or Latin-1
fn decode_string_bytes(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Collapse whitespace, drop byte order marks and straighten curly quotes
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
