use crate::error::CoreError;
use lopdf::Document;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;

/// Upload formats the normalizer can turn into plain text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported(filename: &str) -> bool {
    file_extension(filename).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Normalize uploaded bytes into plain text, dispatching purely on the
/// file extension. Deterministic, no side effects; unsupported extensions
/// and unreadable bytes are validation errors.
pub fn extract_text(content: &[u8], filename: &str) -> Result<String, CoreError> {
    match file_extension(filename).as_deref() {
        Some("pdf") => extract_pdf_text(content),
        Some("doc") | Some("docx") => extract_docx_text(content),
        other => Err(CoreError::Validation(format!(
            "unsupported file extension: {}",
            other.unwrap_or("none")
        ))),
    }
}

/// Page-by-page extraction in physical page order, pages trimmed and
/// joined with newlines. Whitespace-only pages are dropped.
fn extract_pdf_text(content: &[u8]) -> Result<String, CoreError> {
    let document = Document::load_mem(content)
        .map_err(|error| CoreError::Validation(format!("pdf parse error: {error}")))?;

    let mut pages = Vec::new();
    for (page_number, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_number])
            .map_err(|error| CoreError::Validation(format!("pdf parse error: {error}")))?;

        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }

    Ok(pages.join("\n"))
}

/// DOC/DOCX files are ZIP containers; the visible text lives in
/// `word/document.xml` as WordprocessingML paragraphs.
fn extract_docx_text(content: &[u8]) -> Result<String, CoreError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(content))
        .map_err(|error| CoreError::Validation(format!("docx container error: {error}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| CoreError::Validation(format!("docx container error: {error}")))?
        .read_to_string(&mut xml)
        .map_err(|error| CoreError::Validation(format!("docx container error: {error}")))?;

    paragraphs_from_docx_xml(&xml)
}

/// Pull paragraph text out of WordprocessingML. Only `<w:t>` runs carry
/// visible text; `<w:tab/>` renders as a tab. Paragraphs are trimmed,
/// empty ones dropped, the rest joined with newlines.
pub fn paragraphs_from_docx_xml(xml: &str) -> Result<String, CoreError> {
    let run_pattern = Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>")
        .map_err(|error| CoreError::Validation(format!("docx run pattern error: {error}")))?;

    let mut paragraphs = Vec::new();
    for block in xml.split("</w:p>") {
        let mut text = String::new();
        for capture in run_pattern.captures_iter(block) {
            match capture.get(1) {
                Some(run) => text.push_str(&decode_xml_entities(run.as_str())),
                None => text.push('\t'),
            }
        }

        let text = text.trim();
        if !text.is_empty() {
            paragraphs.push(text.to_string());
        }
    }

    Ok(paragraphs.join("\n"))
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
