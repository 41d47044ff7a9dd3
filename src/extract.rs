//! Text extraction for uploaded documents (PDF, DOCX, plain text).
//!
//! Dispatch happens once on [`DocumentKind`]. PDFs yield one [`Segment`]
//! per page; DOCX and text files yield a single segment for the whole
//! file. Files with an unrecognized extension are decoded as UTF-8 and
//! only rejected with [`RagError::UnsupportedFormat`] when that fails.

use std::io::Read;

use crate::error::{RagError, Result};
use crate::models::{Document, DocumentKind, Segment};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY_ENTRY: &str = "word/document.xml";

/// Read `document` from disk and extract its text segments.
///
/// Read and parse failures are returned as [`RagError::Extraction`]; a
/// partially extracted document is never returned.
pub fn extract(document: &Document) -> Result<Vec<Segment>> {
    let bytes = std::fs::read(&document.path)
        .map_err(|e| RagError::extraction(document.path.display().to_string(), e.to_string()))?;
    extract_bytes(document, &bytes)
}

/// Extract segments from bytes already in memory.
pub fn extract_bytes(document: &Document, bytes: &[u8]) -> Result<Vec<Segment>> {
    let path = document.path.display().to_string();
    let source = document.display_name();

    let pages: Vec<(Option<u32>, String)> = match document.kind {
        DocumentKind::Pdf => extract_pdf_pages(bytes)
            .map_err(|e| RagError::extraction(&path, e))?
            .into_iter()
            .enumerate()
            .map(|(i, text)| (Some(i as u32 + 1), text))
            .collect(),
        DocumentKind::Docx => {
            vec![(None, extract_docx(bytes).map_err(|e| RagError::extraction(&path, e))?)]
        }
        DocumentKind::Text => {
            vec![(None, decode_utf8(bytes).map_err(|e| RagError::extraction(&path, e))?)]
        }
        DocumentKind::Unrecognized => match decode_utf8(bytes) {
            Ok(text) => {
                tracing::debug!(path = %path, "unrecognized extension, read as plain text");
                vec![(None, text)]
            }
            Err(_) => return Err(RagError::UnsupportedFormat(path)),
        },
    };

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(index, (page, text))| Segment {
            document_id: document.id.clone(),
            source: source.clone(),
            index,
            page,
            text,
        })
        .collect())
}

fn decode_utf8(bytes: &[u8]) -> std::result::Result<String, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8: {}", e))
}

fn extract_pdf_pages(bytes: &[u8]) -> std::result::Result<Vec<String>, String> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| format!("PDF extraction failed: {}", e))
}

fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| format!("not a DOCX archive: {}", e))?;
    let entry = archive
        .by_name(DOCX_BODY_ENTRY)
        .map_err(|_| format!("{} not found", DOCX_BODY_ENTRY))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| e.to_string())?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!("{} exceeds size limit", DOCX_BODY_ENTRY));
    }
    extract_word_text(&doc_xml)
}

/// Collect `<w:t>` runs, turning paragraph ends into blank lines so the
/// chunker can split on them.
fn extract_word_text(xml: &[u8]) -> std::result::Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => out.push('\n'),
                b"tab" => out.push('\t'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed document XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
