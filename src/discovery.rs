//! Table discovery over uploaded dump files.
//!
//! Tables are found by scanning `INSERT INTO ... ;` statements. Plain text
//! dumps (`.sql`, `.txt`) are read as-is; Word documents (`.docx`) contribute
//! the paragraph text of `word/document.xml`.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

/// Failure to read one dump file
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid docx archive: {0}")]
    Docx(#[from] zip::result::ZipError),
}

fn statement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)INSERT\s+INTO.+?;").expect("valid statement regex"))
}

fn table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)INSERT\s+INTO\s+(?:(\w+)\.)?(\w+)").expect("valid table regex")
    })
}

/// Table names referenced by INSERT statements in `text`
pub fn tables_in_text(text: &str) -> BTreeSet<String> {
    statement_regex()
        .find_iter(text)
        .filter_map(|stmt| {
            table_regex()
                .captures(stmt.as_str())
                .and_then(|caps| caps.get(2))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Extract the dump text of one file according to its extension
pub fn read_dump_text(path: &Path) -> Result<String, DiscoveryError> {
    let is_docx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);

    if is_docx {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut xml = String::new();
        archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
        Ok(docx_paragraph_text(&xml))
    } else {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Join the text runs of each `<w:p>` paragraph, one paragraph per line
pub fn docx_paragraph_text(xml: &str) -> String {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    static TEXT_RUN: OnceLock<Regex> = OnceLock::new();
    let paragraph = PARAGRAPH
        .get_or_init(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("valid paragraph regex"));
    let text_run = TEXT_RUN
        .get_or_init(|| Regex::new(r"(?s)<w:t(?: [^>]*)?>(.*?)</w:t>").expect("valid text regex"));

    paragraph
        .find_iter(xml)
        .map(|p| {
            text_run
                .captures_iter(p.as_str())
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Union of the tables found in `paths`
///
/// Unreadable files are logged and skipped.
pub fn discover_tables<P: AsRef<Path>>(paths: &[P]) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    for path in paths {
        let path = path.as_ref();
        debug!("Processing file: {}", path.display());
        match read_dump_text(path) {
            Ok(text) => tables.extend(tables_in_text(&text)),
            Err(e) => warn!("Error processing file {}: {}", path.display(), e),
        }
    }
    info!("Found {} tables", tables.len());
    tables
}
