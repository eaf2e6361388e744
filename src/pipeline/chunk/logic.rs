// Core splitting: recursive separator descent into base units, then greedy
// packing of units into overlapping chunk spans. Everything works on byte
// spans of one input string; lengths are counted in chars.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::policy::ChunkError;

static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n\s*").expect("paragraph pattern"));
static LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t\r]*").expect("line pattern"));
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["'”’)\]]*\s+"#).expect("sentence pattern"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("word pattern"));

/// Boundary kinds tried in order, coarsest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Separator {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

impl Separator {
    fn next(self) -> Option<Separator> {
        match self {
            Separator::Paragraph => Some(Separator::Line),
            Separator::Line => Some(Separator::Sentence),
            Separator::Sentence => Some(Separator::Word),
            Separator::Word => Some(Separator::Char),
            Separator::Char => None,
        }
    }

    fn pattern(self) -> Option<&'static Regex> {
        match self {
            Separator::Paragraph => Some(&*PARAGRAPH),
            Separator::Line => Some(&*LINE),
            Separator::Sentence => Some(&*SENTENCE),
            Separator::Word => Some(&*WORD),
            Separator::Char => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    pub span: Range<usize>,
    pub chars: usize,
}

/// Split `text` into contiguous units of at most `limit` chars each.
/// Units tile the input: concatenating them in order gives `text` back.
pub fn base_units(text: &str, limit: usize) -> Result<Vec<Unit>, ChunkError> {
    if limit == 0 {
        return Err(ChunkError::SplitFailed("unit limit must be positive".into()));
    }
    let mut out = Vec::new();
    if text.is_empty() {
        return Ok(out);
    }
    descend(text, 0..text.len(), Separator::Paragraph, limit, &mut out)?;

    // tiling check
    let mut cursor = 0usize;
    for unit in &out {
        if unit.span.start != cursor || unit.span.is_empty() {
            return Err(ChunkError::SplitFailed(format!(
                "unit {}..{} does not continue at offset {}",
                unit.span.start, unit.span.end, cursor
            )));
        }
        cursor = unit.span.end;
    }
    if cursor != text.len() {
        return Err(ChunkError::SplitFailed(format!(
            "units stop at {} of {} bytes",
            cursor,
            text.len()
        )));
    }
    Ok(out)
}

fn descend(
    text: &str,
    span: Range<usize>,
    sep: Separator,
    limit: usize,
    out: &mut Vec<Unit>,
) -> Result<(), ChunkError> {
    let piece = slice(text, &span)?;
    let chars = piece.chars().count();
    if chars <= limit {
        out.push(Unit { span, chars });
        return Ok(());
    }

    let Some(re) = sep.pattern() else {
        for part in cut_chars(piece, span.start, limit) {
            let chars = slice(text, &part)?.chars().count();
            out.push(Unit { span: part, chars });
        }
        return Ok(());
    };
    let next = sep.next().unwrap_or(Separator::Char);

    let parts = split_after(re, piece, span.start);
    if parts.len() <= 1 {
        return descend(text, span, next, limit, out);
    }
    for part in parts {
        descend(text, part, next, limit, out)?;
    }
    Ok(())
}

// Cut after every separator match so the separator stays with the left piece.
fn split_after(re: &Regex, piece: &str, offset: usize) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    for m in re.find_iter(piece) {
        let end = m.end();
        if end > start && end < piece.len() {
            parts.push(offset + start..offset + end);
            start = end;
        }
    }
    if start < piece.len() {
        parts.push(offset + start..offset + piece.len());
    }
    parts
}

fn cut_chars(piece: &str, offset: usize, limit: usize) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;
    for (i, _) in piece.char_indices() {
        if count == limit {
            parts.push(offset + start..offset + i);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < piece.len() {
        parts.push(offset + start..offset + piece.len());
    }
    parts
}

/// Greedily pack units into spans of at most `size` chars. Each new span
/// re-includes a word-aligned tail of the previous one, up to `overlap` chars.
/// The full carry fits only when units are at most `size - overlap` chars.
pub fn pack(
    text: &str,
    units: &[Unit],
    size: usize,
    overlap: usize,
) -> Result<Vec<Range<usize>>, ChunkError> {
    let mut spans = Vec::new();
    let Some(first) = units.first() else { return Ok(spans) };

    let mut start = first.span.start;
    let mut end = start;
    let mut len = 0usize;

    for unit in units {
        if unit.chars > size {
            return Err(ChunkError::SplitFailed(format!(
                "unit of {} chars exceeds chunk size {}",
                unit.chars, size
            )));
        }
        if len > 0 && len + unit.chars > size {
            spans.push(start..end);
            // carry must leave room for the next unit and stay shorter than
            // the span it came from, so starts strictly advance
            let budget = overlap.min(size - unit.chars).min(len - 1);
            start = overlap_start(text, start..end, budget)?;
            len = slice(text, &(start..end))?.chars().count();
        }
        end = unit.span.end;
        len += unit.chars;
    }
    if len > 0 {
        spans.push(start..end);
    }
    Ok(spans)
}

// Leftmost start of a suffix of `span` with at most `budget` chars, preferring
// a position right after whitespace. The carry never starts on whitespace; an
// all-whitespace tail means no carry.
fn overlap_start(text: &str, span: Range<usize>, budget: usize) -> Result<usize, ChunkError> {
    if budget == 0 {
        return Ok(span.end);
    }
    let piece = slice(text, &span)?;
    let mut cut = None;
    let mut boundary = None;
    for (i, ch) in piece.char_indices().rev().take(budget) {
        if ch.is_whitespace() {
            continue;
        }
        cut = Some(span.start + i);
        if piece[..i].chars().next_back().is_some_and(char::is_whitespace) {
            boundary = Some(span.start + i);
        }
    }
    Ok(boundary.or(cut).unwrap_or(span.end))
}

fn slice<'a>(text: &'a str, span: &Range<usize>) -> Result<&'a str, ChunkError> {
    text.get(span.clone()).ok_or_else(|| {
        ChunkError::SplitFailed(format!("span {}..{} is not on a char boundary", span.start, span.end))
    })
}
