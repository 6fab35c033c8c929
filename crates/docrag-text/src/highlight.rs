//! Match highlighting with surrounding context.
//!
//! Every term occurrence is located, touching or overlapping matches are
//! merged, and each match is shown with up to `context_window` characters on
//! either side. Context windows that meet are coalesced so no text repeats;
//! the ellipsis marks where the excerpt does not reach the chunk boundary.

use regex::Regex;

use crate::tokenize::term_matchers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightStyle {
    pub open: String,
    pub close: String,
    pub ellipsis: String,
}

impl HighlightStyle {
    pub fn markdown() -> Self {
        Self { open: "**".into(), close: "**".into(), ellipsis: "...".into() }
    }

    /// Bold yellow for terminals.
    pub fn ansi() -> Self {
        Self { open: "\x1b[1;33m".into(), close: "\x1b[0m".into(), ellipsis: "...".into() }
    }
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self::markdown()
    }
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    pub style: HighlightStyle,
    pub context_window: usize,
    pub snippet_len: usize,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self { style: HighlightStyle::default(), context_window: 100, snippet_len: 200 }
    }
}

struct Window {
    start: usize,
    end: usize,
    matches: Vec<(usize, usize)>,
}

impl Highlighter {
    pub fn highlight(&self, text: &str, matchers: &[Regex]) -> String {
        let spans = merged_matches(text, matchers);
        if spans.is_empty() {
            let head: String = text.chars().take(self.snippet_len).collect();
            return head + &self.style.ellipsis;
        }

        let mut windows: Vec<Window> = Vec::new();
        for (start, end) in spans {
            let ctx_start = step_back(text, start, self.context_window);
            let ctx_end = step_forward(text, end, self.context_window);
            match windows.last_mut() {
                Some(w) if ctx_start <= w.end => {
                    w.end = w.end.max(ctx_end);
                    w.matches.push((start, end));
                }
                _ => windows.push(Window { start: ctx_start, end: ctx_end, matches: vec![(start, end)] }),
            }
        }

        let style = &self.style;
        let mut out = String::with_capacity(text.len());
        let last = windows.len() - 1;
        for (i, w) in windows.iter().enumerate() {
            let cut_before = i > 0 || w.start > 0;
            let cut_after = i < last || w.end < text.len();
            if i > 0 {
                out.push(' ');
                out.push_str(&style.ellipsis);
                out.push(' ');
            } else if cut_before {
                out.push_str(&style.ellipsis);
                out.push(' ');
            }
            // whitespace at a cut edge would double the separator space
            let mut cursor = w.start;
            if cut_before {
                let first = w.matches[0].0;
                cursor = first - text[cursor..first].trim_start().len();
            }
            for &(s, e) in &w.matches {
                out.push_str(&text[cursor..s]);
                out.push_str(&style.open);
                out.push_str(&text[s..e]);
                out.push_str(&style.close);
                cursor = e;
            }
            let tail = &text[cursor..w.end];
            out.push_str(if cut_after { tail.trim_end() } else { tail });
        }
        if windows.last().is_some_and(|w| w.end < text.len()) {
            out.push(' ');
            out.push_str(&style.ellipsis);
        }
        out
    }
}

/// Highlight `terms` in `text` with Markdown markers.
pub fn highlight(text: &str, terms: &[String], context_window: usize) -> String {
    let highlighter = Highlighter { context_window, ..Highlighter::default() };
    highlighter.highlight(text, &term_matchers(terms))
}

fn merged_matches(text: &str, matchers: &[Regex]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = matchers
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Byte offset `n` characters before `pos` (clamped to 0).
fn step_back(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos].char_indices().rev().take(n).last().map_or(pos, |(i, _)| i)
}

/// Byte offset `n` characters after `pos` (clamped to the end).
fn step_forward(text: &str, pos: usize, n: usize) -> usize {
    text[pos..].char_indices().nth(n).map_or(text.len(), |(i, _)| pos + i)
}
