//! Format-specific text extraction, dispatched by file extension.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    /// Unknown or missing extensions are treated as plain text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("pdf") => DocumentFormat::Pdf,
            Some("md") | Some("markdown") => DocumentFormat::Markdown,
            _ => DocumentFormat::PlainText,
        }
    }
}

pub fn extract(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path);
    debug!(path = %path.display(), ?format, "extracting");
    let failure = |reason: String| Error::ExtractionFailure { path: path.to_path_buf(), reason };
    match format {
        DocumentFormat::Pdf => {
            let bytes = fs::read(path).map_err(|e| failure(e.to_string()))?;
            // pdf-extract panics on some malformed documents
            match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes)) {
                Ok(res) => res.map_err(|e| failure(e.to_string())),
                Err(_) => Err(failure("pdf parser panicked".into())),
            }
        }
        DocumentFormat::Markdown => read_lossy(path).map(|t| render_markdown(&t)).map_err(|e| failure(e.to_string())),
        DocumentFormat::PlainText => read_lossy(path).map_err(|e| failure(e.to_string())),
    }
}

fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

struct MarkdownPatterns {
    heading: Regex,
    list_marker: Regex,
    quote: Regex,
    rule: Regex,
    image: Regex,
    link: Regex,
    html: Regex,
    emphasis: Regex,
}

fn patterns() -> &'static MarkdownPatterns {
    static P: OnceLock<MarkdownPatterns> = OnceLock::new();
    P.get_or_init(|| MarkdownPatterns {
        heading: Regex::new(r"^\s{0,3}#{1,6}\s+").expect("heading regex"),
        list_marker: Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").expect("list regex"),
        quote: Regex::new(r"^\s*>\s?").expect("quote regex"),
        rule: Regex::new(r"^\s*(?:[-*_]\s*){3,}$").expect("rule regex"),
        image: Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image regex"),
        link: Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link regex"),
        html: Regex::new(r"</?[A-Za-z][^>]*>").expect("html regex"),
        emphasis: Regex::new(r"\*\*|__|\*|`").expect("emphasis regex"),
    })
}

/// Render Markdown source to readable plain text.
///
/// Block structure survives as line breaks; markup (heading hashes, list
/// bullets, quote markers, emphasis, link and image syntax, inline HTML,
/// code fences and horizontal rules) is dropped. Code block contents are kept
/// verbatim.
pub fn render_markdown(src: &str) -> String {
    let p = patterns();
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in src.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence { out.push(line.to_string()); continue; }
        if p.rule.is_match(line) { out.push(String::new()); continue; }
        let line = p.heading.replace(line, "");
        let line = p.quote.replace(&line, "");
        let line = p.list_marker.replace(&line, "");
        let line = p.image.replace_all(&line, "$1");
        let line = p.link.replace_all(&line, "$1");
        let line = p.html.replace_all(&line, "");
        let line = p.emphasis.replace_all(&line, "");
        out.push(line.trim_end().to_string());
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_by_extension() {
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("a/B.PDF")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("notes.markdown")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("Intro.md")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("data.csv")), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("README")), DocumentFormat::PlainText);
    }

    #[test]
    fn markdown_markup_is_stripped() {
        let src = "# Title\n\nSome **bold** and *soft* text with a [link](http://x.y) and `code`.\n\n- item one\n2. item two\n> quoted\n\n---\n\n```rust\nlet snake_case = 1;\n```\n<br/>end";
        let text = render_markdown(src);
        assert_eq!(
            text,
            "Title\n\nSome bold and soft text with a link and code.\n\nitem one\nitem two\nquoted\n\n\n\nlet snake_case = 1;\nend"
        );
    }
}
