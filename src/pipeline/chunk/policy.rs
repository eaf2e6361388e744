use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::logic;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_MIN_CHUNK_LEN: usize = 50;

// smallest effective chunk size for documents shorter than the configured size
const SMALL_DOC_FLOOR: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
    #[error("chunking failed: {0}")]
    SplitFailed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_len: usize,
    pub normalize: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            normalize: true,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        let cfg = Self {
            chunk_size,
            chunk_overlap,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN.min(chunk_size),
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_min_chunk_len(mut self, min_chunk_len: usize) -> Self {
        self.min_chunk_len = min_chunk_len;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap == 0 {
            return Err(ChunkError::InvalidConfig("chunk_overlap must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_len > self.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_len ({}) must not exceed chunk_size ({})",
                self.min_chunk_len, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Sizes actually used for a text of `text_chars` chars. Short documents get
    /// roughly two chunks of at least 100 chars, with overlap a quarter of that.
    pub fn effective_for(&self, text_chars: usize) -> ChunkConfig {
        if text_chars >= self.chunk_size {
            return *self;
        }
        let chunk_size = (text_chars / 2).max(SMALL_DOC_FLOOR).min(self.chunk_size);
        let chunk_overlap = (chunk_size / 4).max(1).min(chunk_size - 1);
        let min_chunk_len = self.min_chunk_len.min(chunk_size);
        ChunkConfig { chunk_size, chunk_overlap, min_chunk_len, ..*self }
    }

    /// Longest base unit. Leaves room for a full overlap carry in front of
    /// any unit, so unbroken tokens still share text across chunk boundaries.
    pub fn unit_limit(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    /// Byte offsets into the normalized text.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Chunked {
    pub normalized: String,
    pub effective: ChunkConfig,
    pub chunks: Vec<Chunk>,
}

impl Chunked {
    pub fn into_texts(self) -> Vec<String> {
        self.chunks.into_iter().map(|c| c.text).collect()
    }
}

/// Adaptive text chunker. Pure and deterministic; safe to share across tasks.
#[derive(Clone, Debug)]
pub struct ChunkingPolicy {
    cfg: ChunkConfig,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self { cfg: ChunkConfig::default() }
    }
}

impl ChunkingPolicy {
    pub fn new(cfg: ChunkConfig) -> Result<Self, ChunkError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &ChunkConfig { &self.cfg }

    pub fn split(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        Ok(self.split_detailed(text)?.into_texts())
    }

    pub fn split_detailed(&self, text: &str) -> Result<Chunked, ChunkError> {
        let normalized = if self.cfg.normalize { normalize_whitespace(text) } else { text.to_string() };
        if normalized.trim().is_empty() {
            return Ok(Chunked { normalized, effective: self.cfg, chunks: Vec::new() });
        }

        let text_chars = normalized.chars().count();
        let effective = self.cfg.effective_for(text_chars);
        debug!(
            text_chars,
            chunk_size = effective.chunk_size,
            chunk_overlap = effective.chunk_overlap,
            "chunking"
        );

        let units = logic::base_units(&normalized, effective.unit_limit())?;
        let spans = logic::pack(&normalized, &units, effective.chunk_size, effective.chunk_overlap)?;

        let mut chunks: Vec<Chunk> = Vec::with_capacity(spans.len());
        for span in spans {
            let raw = normalized.get(span.clone()).ok_or_else(|| {
                ChunkError::SplitFailed(format!("span {}..{} out of range", span.start, span.end))
            })?;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.chars().count() < effective.min_chunk_len {
                continue;
            }
            let start = span.start + (raw.len() - raw.trim_start().len());
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                end: start + trimmed.len(),
                text: trimmed.to_string(),
            });
        }

        Ok(Chunked { normalized, effective, chunks })
    }
}

/// Split with explicit sizes and the default minimum length and normalization.
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>, ChunkError> {
    ChunkingPolicy::new(ChunkConfig::new(chunk_size, chunk_overlap)?)?.split(text)
}

/// Collapse horizontal whitespace to single spaces, trim lines, and reduce any
/// run of blank lines to one paragraph break.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            blank_run = true;
            continue;
        };
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(first);
        for w in words {
            out.push(' ');
            out.push_str(w);
        }
        blank_run = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lorem_paragraph(seed: usize, target: usize) -> String {
        const WORDS: [&str; 12] = [
            "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
            "do", "eiusmod", "tempor",
        ];
        let mut out = String::new();
        let mut i = seed;
        while out.len() < target {
            if !out.is_empty() {
                out.push(if i % 9 == 0 { '.' } else { ' ' });
                if i % 9 == 0 { out.push(' '); }
            }
            out.push_str(WORDS[i % WORDS.len()]);
            i += 7;
        }
        out
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        let policy = ChunkingPolicy::default();
        assert!(policy.split("").unwrap().is_empty());
        assert!(policy.split("   ").unwrap().is_empty());
        assert!(policy.split("\n\t \n").unwrap().is_empty());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(ChunkConfig::new(0, 0), Err(ChunkError::InvalidConfig(_))));
        assert!(matches!(ChunkConfig::new(100, 0), Err(ChunkError::InvalidConfig(_))));
        assert!(matches!(ChunkConfig::new(100, 100), Err(ChunkError::InvalidConfig(_))));
        assert!(matches!(ChunkConfig::new(100, 150), Err(ChunkError::InvalidConfig(_))));
        let too_strict = ChunkConfig::default().with_min_chunk_len(5000);
        assert!(matches!(ChunkingPolicy::new(too_strict), Err(ChunkError::InvalidConfig(_))));
        assert!(ChunkConfig::new(1000, 200).is_ok());
        assert_eq!(ChunkConfig::new(40, 10).unwrap().min_chunk_len, 40);
    }

    #[test]
    fn small_documents_get_smaller_chunks() {
        let cfg = ChunkConfig::default();
        let eff = cfg.effective_for(800);
        assert_eq!(eff.chunk_size, 400);
        assert_eq!(eff.chunk_overlap, 100);

        let eff = cfg.effective_for(80);
        assert_eq!(eff.chunk_size, 100);
        assert_eq!(eff.chunk_overlap, 25);

        // large documents keep the configured sizes
        assert_eq!(cfg.effective_for(5000), cfg);
    }

    #[test]
    fn small_document_sizes_stay_within_bounds() {
        let cfg = ChunkConfig::default();
        for len in [0usize, 1, 99, 150, 201, 999] {
            let eff = cfg.effective_for(len);
            assert!(eff.chunk_size < cfg.chunk_size);
            assert!(eff.chunk_size >= 100);
            assert!(eff.chunk_overlap < eff.chunk_size);
        }
    }

    #[test]
    fn eighty_char_text_is_one_chunk() {
        let text = "  The quick brown fox jumps over the lazy dog while the cat watches from afar.  ";
        let stripped = text.trim();
        assert_eq!(stripped.chars().count(), 76);
        let chunks = ChunkingPolicy::default().split(text).unwrap();
        assert_eq!(chunks, vec![stripped.to_string()]);
    }

    #[test]
    fn short_fragments_are_dropped() {
        // 40 chars: one chunk, but below the 50-char minimum
        let text = "Tiny note that says almost nothing here.";
        assert!(ChunkingPolicy::default().split(text).unwrap().is_empty());

        let lenient = ChunkConfig::default().with_min_chunk_len(10);
        let chunks = ChunkingPolicy::new(lenient).unwrap().split(text).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn normalization_keeps_paragraphs_and_lines() {
        let raw = "  Title\t\there \r\nline   two\n\n\n\n  Next   para \x0c\n";
        assert_eq!(normalize_whitespace(raw), "Title here\nline two\n\nNext para");
    }

    #[test]
    fn normalization_can_be_disabled() {
        let text = format!("{}\n\n\n{}", lorem_paragraph(1, 300), lorem_paragraph(2, 300));
        let cfg = ChunkConfig::default().with_normalize(false);
        let out = ChunkingPolicy::new(cfg).unwrap().split_detailed(&text).unwrap();
        assert_eq!(out.normalized, text);
    }

    #[test]
    fn long_prose_with_paragraphs() {
        let paragraphs: Vec<String> = (0..8).map(|i| lorem_paragraph(i, 290)).collect();
        let text = paragraphs.join("\n\n");
        assert!((2300..=2500).contains(&text.chars().count()));

        let out = ChunkingPolicy::default().split_detailed(&text).unwrap();
        assert_eq!(out.effective.chunk_size, 1000);
        let lens: Vec<usize> = out.chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lens, vec![891, 777, 775, 491]);
        for c in &out.chunks {
            assert!(c.text.chars().count() <= 1000);
            assert!(c.text.chars().count() > 50);
        }
        for pair in out.chunks.windows(2) {
            // consecutive chunks share a tail/head region of at most 200 chars
            assert!(pair[1].start < pair[0].end);
            let shared = &out.normalized[pair[1].start..pair[0].end];
            assert!(!shared.trim().is_empty());
            assert!(shared.chars().count() <= 200);
        }
    }

    #[test]
    fn chunks_prefer_paragraph_boundaries() {
        let paragraphs: Vec<String> = (0..6).map(|i| lorem_paragraph(i, 250)).collect();
        let text = paragraphs.join("\n\n");
        let chunks = ChunkingPolicy::default().split(&text).unwrap();
        // every chunk ends exactly where some paragraph ends
        for c in &chunks {
            assert!(paragraphs.iter().any(|p| c.ends_with(p.as_str())), "{c:?}");
        }
    }

    fn assert_boundaries_overlap(out: &Chunked, overlap: usize) {
        for pair in out.chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "{}..{} then {}..{}", pair[0].start, pair[0].end, pair[1].start, pair[1].end);
            let shared = &out.normalized[pair[1].start..pair[0].end];
            assert!(!shared.trim().is_empty());
            assert!(shared.chars().count() <= overlap);
        }
    }

    #[test]
    fn one_long_word_is_cut_by_chars() {
        let text = "x".repeat(2500);
        let out = ChunkingPolicy::new(ChunkConfig::new(1000, 200).unwrap()).unwrap().split_detailed(&text).unwrap();
        let spans: Vec<(usize, usize)> = out.chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 800), (600, 1600), (1400, 2400), (2200, 2500)]);
        assert_boundaries_overlap(&out, 200);
    }

    #[test]
    fn long_url_inside_prose_keeps_overlap() {
        let prose = &lorem_paragraph(3, 600)[..600];
        let url = format!("https://example.com/{}", "a".repeat(1100));
        let text = format!("{prose} {url} {prose}");
        let out = ChunkingPolicy::default().split_detailed(&text).unwrap();

        assert_eq!(out.chunks.len(), 4);
        for c in &out.chunks {
            assert!(c.text.chars().count() <= 1000);
        }
        assert_boundaries_overlap(&out, 200);
        let url_start = text.find("https://").unwrap();
        assert!(out.chunks.iter().any(|c| c.start <= url_start && url_start < c.end));
        assert_eq!(out.chunks.last().unwrap().end, text.len());
    }

    #[test]
    fn repeated_calls_agree() {
        let text = (0..5).map(|i| lorem_paragraph(i, 400)).collect::<Vec<_>>().join("\n\n");
        let a = split(&text, 300, 60).unwrap();
        let b = split(&text, 300, 60).unwrap();
        assert_eq!(a, b);
    }

    fn word_text() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,12}", 1..400).prop_map(|words| words.join(" "))
    }

    // mostly short words with the occasional token longer than any chunk
    fn token_text() -> impl Strategy<Value = String> {
        let word = prop_oneof![4 => "[a-z]{1,12}", 1 => "[a-z0-9/:.]{300,900}"];
        prop::collection::vec(word, 1..120).prop_map(|words| words.join(" "))
    }

    fn prose_text() -> impl Strategy<Value = String> {
        let sentence = prop::collection::vec("[a-zA-Z]{1,10}", 1..20).prop_map(|w| w.join(" ") + ".");
        let para = prop::collection::vec(sentence, 1..6).prop_map(|s| s.join(" "));
        prop::collection::vec(para, 1..10).prop_map(|p| p.join("\n\n"))
    }

    proptest! {
        #[test]
        fn chunks_are_bounded_ordered_and_cover_input(
            text in prose_text(),
            size in 40usize..600,
            overlap_pct in 1usize..50,
        ) {
            let overlap = (size * overlap_pct / 100).max(1);
            let cfg = ChunkConfig::new(size, overlap).unwrap().with_min_chunk_len(1);
            let out = ChunkingPolicy::new(cfg).unwrap().split_detailed(&text).unwrap();

            prop_assert!(!out.chunks.is_empty());
            for c in &out.chunks {
                prop_assert!(c.text.chars().count() <= out.effective.chunk_size);
                prop_assert_eq!(&out.normalized[c.start..c.end], c.text.as_str());
            }
            for pair in out.chunks.windows(2) {
                prop_assert!(pair[1].start > pair[0].start);
                prop_assert!(pair[1].start <= pair[0].end + 2);
            }
            // every non-whitespace char lands in some chunk
            for (i, ch) in out.normalized.char_indices() {
                if ch.is_whitespace() { continue; }
                prop_assert!(out.chunks.iter().any(|c| c.start <= i && i < c.end));
            }
        }

        #[test]
        fn word_streams_overlap_at_every_boundary(
            text in word_text(),
            size in 60usize..400,
        ) {
            let overlap = 14 + size / 20;
            let cfg = ChunkConfig::new(size, overlap).unwrap().with_min_chunk_len(1);
            let out = ChunkingPolicy::new(cfg).unwrap().split_detailed(&text).unwrap();
            for pair in out.chunks.windows(2) {
                prop_assert!(pair[1].start < pair[0].end);
                let shared = &out.normalized[pair[1].start..pair[0].end];
                prop_assert!(!shared.trim().is_empty());
            }
        }

        #[test]
        fn unbroken_tokens_overlap_at_every_boundary(
            text in token_text(),
            size in 60usize..400,
            overlap_pct in 5usize..50,
        ) {
            let overlap = size * overlap_pct / 100;
            let cfg = ChunkConfig::new(size, overlap).unwrap().with_min_chunk_len(1);
            let out = ChunkingPolicy::new(cfg).unwrap().split_detailed(&text).unwrap();
            for c in &out.chunks {
                prop_assert!(c.text.chars().count() <= out.effective.chunk_size);
            }
            for pair in out.chunks.windows(2) {
                prop_assert!(pair[1].start < pair[0].end);
                let shared = &out.normalized[pair[1].start..pair[0].end];
                prop_assert!(!shared.trim().is_empty());
            }
        }

        #[test]
        fn splitting_is_deterministic(text in prose_text(), size in 60usize..300) {
            let overlap = size / 5 + 1;
            let a = split(&text, size, overlap).unwrap();
            let b = split(&text, size, overlap).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
