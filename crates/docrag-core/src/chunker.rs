//! Splits one document's extracted text into ordered, overlapping chunks.
//!
//! Text is first cut into boundary units (sentences or paragraphs, see
//! [`BoundaryPolicy`]). Every unit keeps its trailing whitespace, so the units
//! tile the input exactly and every chunk is a contiguous slice of it. Units
//! are packed greedily up to `chunk_size` characters; when a chunk closes, its
//! trailing sentences (or words, for paragraph mode) are carried into the next
//! chunk while their combined length stays within `overlap`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::config::ChunkingSettings;
use crate::error::Result;
use crate::types::{Chunk, ChunkMetadata, DocumentMeta};

/// Where chunks may be cut. Pick one per corpus; the two produce different
/// chunk sets for the same text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Terminal punctuation (`.`, `!`, `?`) followed by whitespace. Overlap carries sentences.
    #[default]
    Sentence,
    /// Blank lines. Overlap carries words.
    Paragraph,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentence => f.write_str("sentence"),
            Self::Paragraph => f.write_str("paragraph"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Unit {
    Word,
    Sentence,
    Paragraph,
}

impl BoundaryPolicy {
    fn unit(self) -> Unit {
        match self {
            Self::Sentence => Unit::Sentence,
            Self::Paragraph => Unit::Paragraph,
        }
    }

    fn carry_unit(self) -> Unit {
        match self {
            Self::Sentence => Unit::Sentence,
            Self::Paragraph => Unit::Word,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Chunker {
    /// Rejects `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> ChunkingSettings {
        self.settings
    }

    /// Chunk `text`, attaching `meta` plus position metadata to every chunk.
    pub fn chunk(&self, text: &str, meta: &DocumentMeta) -> Vec<Chunk> {
        let spans = self.spans(text);
        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| Chunk {
                text: text[span].to_string(),
                metadata: ChunkMetadata::from_document(meta, chunk_index, total_chunks),
            })
            .collect()
    }

    /// Byte ranges of the chunks `chunk` would produce.
    ///
    /// Consecutive ranges either touch or overlap; the first starts at 0 and
    /// the last ends at `text.len()`.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        let mut current: Option<Range<usize>> = None;
        let mut current_len = 0usize;

        for unit in split_units(text, self.settings.boundary.unit()) {
            let unit_len = char_len(&text[unit.clone()]);
            match current.as_mut() {
                Some(span) => {
                    if current_len + unit_len > self.settings.chunk_size {
                        spans.push(span.clone());
                        // carried text plus the incoming unit must still fit
                        let budget = self.settings.overlap.min(self.settings.chunk_size.saturating_sub(unit_len));
                        span.start = carry_start(text, span.clone(), budget, self.settings.boundary);
                        current_len = char_len(&text[span.clone()]);
                    }
                    span.end = unit.end;
                }
                None => current = Some(unit.clone()),
            }
            current_len += unit_len;
        }
        if let Some(span) = current {
            spans.push(span);
        }
        spans
    }
}

/// Start of the tail of `span` carried into the next chunk: trailing carry
/// units whose total length stays within `budget`. Never the whole span.
fn carry_start(text: &str, span: Range<usize>, budget: usize, policy: BoundaryPolicy) -> usize {
    let mut start = span.end;
    if budget == 0 {
        return start;
    }
    let body = &text[span.clone()];
    let pieces = split_units(body, policy.carry_unit());
    let mut carried = 0usize;
    for piece in pieces.iter().skip(1).rev() {
        let len = char_len(&body[piece.clone()]);
        if carried + len > budget {
            break;
        }
        carried += len;
        start = span.start + piece.start;
    }
    start
}

/// Chunk with an ad-hoc configuration.
pub fn chunk(text: &str, meta: &DocumentMeta, settings: ChunkingSettings) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(settings)?.chunk(text, meta))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `text` into units that each end with the whitespace run following a
/// boundary. Leading whitespace sticks to the first unit.
fn split_units(text: &str, unit: Unit) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = 0usize;
    let mut has_content = false;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !c.is_whitespace() {
            prev = Some(c);
            has_content = true;
            continue;
        }
        let mut end = i + c.len_utf8();
        let mut newlines = usize::from(c == '\n');
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_whitespace() {
                break;
            }
            newlines += usize::from(d == '\n');
            end = j + d.len_utf8();
            chars.next();
        }
        let boundary = match unit {
            Unit::Word => true,
            Unit::Sentence => matches!(prev, Some('.' | '!' | '?')),
            Unit::Paragraph => newlines >= 2,
        };
        if boundary && has_content && end < text.len() {
            units.push(start..end);
            start = end;
            has_content = false;
        }
    }
    if start < text.len() {
        units.push(start..text.len());
    }
    units
}
