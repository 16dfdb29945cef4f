//! Heading-aware chunking of Markdown documents.
//!
//! A document is normalised (runs of 3+ newlines collapse to a blank line),
//! split at `##`/`###` headings, and any section longer than the target size
//! is cut into overlapping windows whose ends snap back to a line break.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::Chunk;
use crate::{Error, Result};

/// Fragments shorter than this (in characters) are dropped.
pub const MIN_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_size: 600, overlap: 100 }
    }
}

impl ChunkingConfig {
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        if overlap >= target_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than the target size ({target_size})"
            )));
        }
        Ok(Self { target_size, overlap })
    }
}

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"))
}

fn heading_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{2,3})[ \t]+(.+)$").expect("heading pattern is valid"))
}

pub fn normalize(text: &str) -> String {
    newline_runs().replace_all(text.trim(), "\n\n").into_owned()
}

fn char_len(s: &str) -> usize { s.chars().count() }

/// Splits a document into `(heading, block)` pairs. Each block starts at its
/// heading line; text before the first heading gets an empty heading.
pub fn split_by_headings(text: &str) -> Vec<(String, String)> {
    let text = normalize(text);
    if text.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut last_start = 0;
    let mut heading = String::new();
    for caps in heading_line().captures_iter(&text) {
        let Some(line) = caps.get(0) else { continue };
        let block = text[last_start..line.start()].trim();
        if !block.is_empty() {
            parts.push((heading.clone(), block.to_string()));
        }
        heading = caps.get(2).map(|t| t.as_str().trim().to_string()).unwrap_or_default();
        last_start = line.start();
    }
    let block = text[last_start..].trim();
    if !block.is_empty() {
        parts.push((heading, block.to_string()));
    }
    parts
}

/// Cuts `text` into windows of `size` characters overlapping by `overlap`.
///
/// A window that does not reach the end is shortened to just after the last
/// newline inside it (when that newline is past the window start). The window
/// start always moves forward; when snapping would make the overlap swallow
/// the whole step, that step carries no overlap.
pub fn split_with_overlap(text: &str, size: usize, overlap: usize) -> Vec<String> {
    assert!(overlap < size, "overlap ({overlap}) must be smaller than size ({size})");
    let text = normalize(text);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = start + size;
        if end < len {
            if let Some(newline) = chars[start..=end].iter().rposition(|&c| c == '\n') {
                if newline > 0 {
                    end = start + newline + 1;
                }
            }
        } else {
            end = len;
        }
        let window: String = chars[start..end].iter().collect();
        let window = window.trim();
        if !window.is_empty() {
            windows.push(window.to_string());
        }
        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    windows
}

/// Chunks one document. `section` and `source` are left empty for the caller
/// to fill in.
pub fn chunk(document: &str, target_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig::new(target_size, overlap)?;
    let mut chunks = Vec::new();
    for (heading, block) in split_by_headings(document) {
        let pieces = if char_len(&block) <= config.target_size {
            vec![block]
        } else {
            split_with_overlap(&block, config.target_size, config.overlap)
        };
        for text in pieces {
            if char_len(&text) >= MIN_CHUNK_CHARS {
                chunks.push(Chunk { heading: heading.clone(), text, section: String::new(), source: String::new() });
            }
        }
    }
    Ok(chunks)
}
