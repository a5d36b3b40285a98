//! Plain-text extraction for PDF, Word, and web page sources.
//!
//! Files are dispatched on extension (`.pdf`, `.docx`); URLs are fetched
//! once with a single GET and their markup stripped. Every entry point
//! returns UTF-8 text or a [`RagError`]; nothing here touches session state.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use scraper::{Html, Node};
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{RagError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Elements whose text content is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A document source as given by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(std::path::PathBuf),
    Url(String),
}

impl Source {
    /// `http://` and `https://` inputs are URLs, everything else is a path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Url(trimmed.to_string())
        } else {
            Source::File(trimmed.into())
        }
    }
}

/// Lower-cased extension including the dot, or an empty string.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Read a local file and extract its text according to its extension.
pub fn extract_file(path: &Path) -> Result<String> {
    let ext = extension_of(&path.to_string_lossy());
    // Reject before touching the filesystem.
    if !matches!(ext.as_str(), ".pdf" | ".docx") {
        return Err(RagError::UnsupportedFormat(display_ext(&ext)));
    }
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes, &ext)
}

/// Extract text from in-memory file contents. `extension` may be given
/// with or without the leading dot and in any case.
pub fn extract_bytes(bytes: &[u8], extension: &str) -> Result<String> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        _ => Err(RagError::UnsupportedFormat(display_ext(&format!(
            ".{}",
            ext
        )))),
    }
}

fn display_ext(ext: &str) -> String {
    if ext.is_empty() || ext == "." {
        "(no extension)".to_string()
    } else {
        ext.to_string()
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF: {}", e)))?;
    debug!(pages = pages.len(), "extracted pdf");
    // One line group per page in page order; a page without a text layer
    // contributes an empty line.
    Ok(pages
        .iter()
        .map(|p| p.trim())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("DOCX: {}", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| RagError::Extraction("DOCX: word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| RagError::Extraction(format!("DOCX: {}", e)))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(RagError::Extraction(
            "DOCX: word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&doc_xml).map(|paras| paras.join("\n"))
}

/// Collect the text of each `w:p` paragraph in document order.
///
/// Paragraphs nested inside another one (text boxes, `w:txbxContent`) are
/// emitted as their own lines right after the paragraph that holds them,
/// so neither the outer text nor the boxed text is lost.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    // Open paragraphs, innermost last.
    let mut open: Vec<String> = Vec::new();
    // Finished nested paragraphs waiting for their top-level parent.
    let mut nested: Vec<String> = Vec::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                b"tab" => push_to(&mut open, "\t"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" => finish_paragraph(&open, &mut paragraphs, &mut nested, String::new()),
                b"tab" => push_to(&mut open, "\t"),
                b"br" | b"cr" => push_to(&mut open, "\n"),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| RagError::Extraction(format!("DOCX: {}", e)))?;
                push_to(&mut open, &text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = open.pop() {
                        finish_paragraph(&open, &mut paragraphs, &mut nested, p);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(RagError::Extraction(format!("DOCX: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    // Unclosed markup: keep whatever was collected.
    paragraphs.extend(open.into_iter().filter(|p| !p.is_empty()));
    paragraphs.extend(nested);
    Ok(paragraphs)
}

fn finish_paragraph(
    open: &[String],
    paragraphs: &mut Vec<String>,
    nested: &mut Vec<String>,
    text: String,
) {
    if open.is_empty() {
        paragraphs.push(text);
        paragraphs.append(nested);
    } else {
        nested.push(text);
    }
}

fn push_to(open: &mut [String], s: &str) {
    if let Some(p) = open.last_mut() {
        p.push_str(s);
    }
}

/// Visible text of an HTML page: every text node outside hidden elements,
/// trimmed, one per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| match a.value() {
            Node::Element(el) => HIDDEN_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        let s: &str = text;
        let s = s.trim();
        if !s.is_empty() {
            lines.push(s);
        }
    }
    lines.join("\n")
}

/// Fetches web pages and memoises their extracted text by URL.
pub struct UrlFetcher {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, String>>,
}

impl UrlFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RagError::Fetch {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch `url` and return its visible text. Only successful results are cached.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        if let Some(text) = self.cached(url) {
            debug!(url, "url cache hit");
            return Ok(text);
        }

        let fetch_err = |message: String| RagError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }
        let body = response
            .text()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let text = html_to_text(&body);
        info!(url, chars = text.chars().count(), "fetched url");
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), text.clone());
        }
        Ok(text)
    }

    fn cached(&self, url: &str) -> Option<String> {
        self.cache.lock().ok().and_then(|c| c.get(url).cloned())
    }
}
