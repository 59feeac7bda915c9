//! Text extraction for uploaded files.
//!
//! [`ExtractingDecoder`] is the [`ContentDecoder`] the application hands to
//! the orchestrator. PDF and OOXML (`.docx`, `.pptx`) payloads are turned
//! into plain text here; everything else goes through
//! [`PlainTextDecoder`]. Failures surface as [`QaError::Decode`], which the
//! orchestrator reports as a rejected ingestion.

use std::io::Read;
use std::path::Path;

use docqa_core::decode::{ContentDecoder, PlainTextDecoder};
use docqa_core::{QaError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

/// Maximum decompressed bytes read from one ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Guess a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("docx") => MIME_DOCX,
        Some("pptx") => MIME_PPTX,
        Some("md") | Some("markdown") => MIME_MARKDOWN,
        _ => MIME_TEXT,
    }
}

/// Decoder for every content type the CLI can ingest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractingDecoder;

impl ContentDecoder for ExtractingDecoder {
    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let text = match content_type {
            MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| QaError::Decode(format!("PDF extraction failed: {e}")))?,
            MIME_DOCX => {
                let xml = read_entries(bytes, |name| name == "word/document.xml")?;
                if xml.is_empty() {
                    return Err(ooxml("word/document.xml not found"));
                }
                paragraphs(&xml[0])?
            }
            MIME_PPTX => {
                let slides = read_entries(bytes, |name| {
                    name.starts_with("ppt/slides/slide") && name.ends_with(".xml")
                })?;
                let mut parts = Vec::with_capacity(slides.len());
                for xml in &slides {
                    let text = paragraphs(xml)?;
                    if !text.trim().is_empty() {
                        parts.push(text.trim_end().to_string());
                    }
                }
                parts.join("\n\n")
            }
            _ => return PlainTextDecoder.decode(bytes, content_type),
        };
        Ok(text.replace("\r\n", "\n"))
    }
}

fn ooxml(message: impl std::fmt::Display) -> QaError {
    QaError::Decode(format!("OOXML extraction failed: {message}"))
}

/// Read the ZIP entries whose names match, ordered by the number embedded
/// in the name (`slide2.xml` before `slide10.xml`).
fn read_entries(bytes: &[u8], wanted: impl Fn(&str) -> bool) -> Result<Vec<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml)?;
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| wanted(n))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        let digits: String = name.chars().filter(char::is_ascii_digit).collect();
        (digits.parse::<u64>().unwrap_or(u64::MAX), name.clone())
    });

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let entry = archive.by_name(&name).map_err(ooxml)?;
        let mut buf = Vec::new();
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut buf)
            .map_err(ooxml)?;
        if buf.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ooxml(format!("{name} exceeds size limit")));
        }
        out.push(buf);
    }
    Ok(out)
}

/// Collect `<*:t>` text runs, one line per `<*:p>` paragraph.
///
/// WordprocessingML (`w:`) and DrawingML (`a:`) share these local names.
fn paragraphs(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::Text(t) if in_text => {
                out.push_str(&t.unescape().map_err(ooxml)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
