//! Sentence-aligned, word-budgeted chunking with sentence-count overlap.
//!
//! Token counts are whitespace word counts, not subword tokens. Overlap is a
//! number of *sentences* carried from the end of the closed chunk into the next
//! one and is independent of the word budget.

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};

/// Lowercased words ending in '.' that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
    "inc.", "ltd.", "co.", "corp.", "fig.", "approx.", "dept.",
    "jan.", "feb.", "mar.", "apr.", "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.", "dec.",
];

/// Collapses newlines and whitespace runs to single spaces and trims.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-delimited word count.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn ends_with_abbreviation(fragment: &str) -> bool {
    let Some(last) = fragment.split_whitespace().last() else { return false };
    let lower = last.to_lowercase();
    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    // Single initial such as "J." in "J. Smith".
    let mut chars = last.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_alphabetic())
}

/// A sentence as a slice of the text it was split from.
#[derive(Debug, Clone, Copy)]
struct Sentence<'a> {
    text: &'a str,
    start: usize,
}

impl AsRef<str> for Sentence<'_> {
    fn as_ref(&self) -> &str {
        self.text
    }
}

/// UAX #29 sentence spans with surrounding whitespace excluded. Fragments that
/// only ended on a known abbreviation or an initial are merged with the next.
fn sentence_spans(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut pending: Option<(usize, usize)> = None;
    for (offset, fragment) in text.split_sentence_bound_indices() {
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            continue;
        }
        let start = offset + (fragment.len() - fragment.trim_start().len());
        let end = start + trimmed.len();
        let (start, end) = match pending.take() {
            Some((first, _)) => (first, end),
            None => (start, end),
        };
        if ends_with_abbreviation(&text[start..end]) {
            pending = Some((start, end));
        } else {
            sentences.push(Sentence { text: &text[start..end], start });
        }
    }
    if let Some((start, end)) = pending {
        sentences.push(Sentence { text: &text[start..end], start });
    }
    sentences
}

/// Splits text into trimmed sentences using UAX #29 sentence bounds, re-joining
/// fragments that only ended on a known abbreviation or an initial.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_spans(text).into_iter().map(|s| s.text.to_string()).collect()
}

/// Greedy grouping of sentences under `max_tokens` with sentence overlap.
///
/// A sentence that alone exceeds the budget forms its own oversized group.
pub fn group_sentences<S: AsRef<str> + Clone>(
    sentences: &[S],
    max_tokens: usize,
    overlap_sentences: usize,
) -> Vec<Vec<S>> {
    let mut groups = Vec::new();
    let mut current: Vec<S> = Vec::new();
    let mut current_tokens = 0usize;
    for sentence in sentences {
        let tokens = count_tokens(sentence.as_ref());
        if current.is_empty() || current_tokens + tokens <= max_tokens {
            current.push(sentence.clone());
            current_tokens += tokens;
            continue;
        }
        let keep = overlap_sentences.min(current.len());
        let seed = current[current.len() - keep..].to_vec();
        groups.push(std::mem::replace(&mut current, seed));
        current.push(sentence.clone());
        current_tokens = current.iter().map(|s| count_tokens(s.as_ref())).sum();
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Splits already-cleaned `text` into overlapping chunks. Each chunk is the
/// slice of `text` from its first sentence to its last. Empty input yields no chunks.
pub fn chunk(text: &str, max_tokens: usize, overlap_sentences: usize) -> Vec<String> {
    let sentences = sentence_spans(text);
    group_sentences(&sentences, max_tokens, overlap_sentences)
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            Some(text[first.start..last.start + last.text.len()].to_string())
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Cleans and chunks one document, numbering chunks from 0.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let cleaned = clean(&doc.text);
        let chunks: Vec<Chunk> = chunk(&cleaned, self.config.max_tokens_per_chunk, self.config.overlap_sentences)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk { text, source_doc_id: doc.id.clone(), sequence_index })
            .collect();
        debug!(doc_id = %doc.id, chunks = chunks.len(), "chunked document");
        chunks
    }
}
