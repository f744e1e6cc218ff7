//! Full-text validation before a record enters an archive.

/// Why an extracted text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextIssue {
    /// Bytes are not valid UTF-8.
    NotUtf8,
    /// Empty or whitespace-only extraction.
    Empty,
    /// Encoding damage left GROBID's telltale replacement glyphs.
    Mojibake,
}

impl std::fmt::Display for TextIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUtf8 => f.write_str("text is not valid UTF-8"),
            Self::Empty => f.write_str("text is empty"),
            Self::Mojibake => f.write_str("text contains mojibake markers"),
        }
    }
}

/// Glyphs that only show up when the PDF's encoding was mangled.
const MOJIBAKE_MARKERS: [char; 3] = ['¼', '¾', '↕'];

/// Accept an extracted text or say why not.
pub fn validate_text(bytes: &[u8]) -> Result<&str, TextIssue> {
    let text = std::str::from_utf8(bytes).map_err(|_| TextIssue::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(TextIssue::Empty);
    }
    if text.chars().any(|c| MOJIBAKE_MARKERS.contains(&c)) {
        return Err(TextIssue::Mojibake);
    }
    Ok(text)
}
