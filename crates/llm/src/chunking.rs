use condense_common::{CondenseError, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Stand-in for periods inside abbreviations while sentences are split
const ABBREVIATION_SENTINEL: char = '\u{E000}';

/// Abbreviations whose periods never end a sentence
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Inc.", "Ltd.", "Co.", "Corp.", "i.e.", "e.g.", "etc.",
    "vs.", "a.m.", "p.m.", "U.S.", "U.K.", "E.U.",
];

static ABBREVIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Longest first so "Mrs." wins over "Mr." style prefixes
    let mut sorted: Vec<&str> = ABBREVIATIONS.to_vec();
    sorted.sort_by_key(|a| std::cmp::Reverse(a.len()));
    let alternation = sorted
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})", alternation)).expect("abbreviation pattern is valid")
});

/// One unit of work for the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 0-based position in the segmenter output
    pub position: usize,

    /// Segment text
    pub text: String,
}

/// Tag chunks with dense 0..N-1 positions
pub fn into_segments(chunks: Vec<String>) -> Vec<Segment> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(position, text)| Segment { position, text })
        .collect()
}

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Replace every line-break variant with a single space
fn flatten_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn protect_abbreviations(text: &str) -> String {
    ABBREVIATION_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps[0].replace('.', &ABBREVIATION_SENTINEL.to_string())
        })
        .into_owned()
}

fn restore_abbreviations(text: &str) -> String {
    text.replace(ABBREVIATION_SENTINEL, ".")
}

/// Split text into sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// input. Periods inside known abbreviations do not end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let protected = protect_abbreviations(text);

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = protected.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let sentence = candidate.trim();
    if !sentence.is_empty() {
        sentences.push(restore_abbreviations(sentence));
    }
}

/// Pack whole sentences into chunks of at most `chunk_size` words.
///
/// A chunk only exceeds `chunk_size` when a single sentence does. No overlap.
pub fn chunk_by_sentences(text: &str, chunk_size: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(CondenseError::invalid_input("chunk size must be greater than 0"));
    }

    let sentences = split_sentences(&flatten_line_breaks(text));
    debug!("Split content into {} sentences", sentences.len());

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for sentence in &sentences {
        let sentence_words = word_count(sentence);

        if current_words > 0 && current_words + sentence_words > chunk_size {
            chunks.push(current.join(" "));
            current.clear();
            current_words = 0;
        }

        current.push(sentence);
        current_words += sentence_words;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    debug!(
        "Created {} chunks from {} sentences (target {} words)",
        chunks.len(),
        sentences.len(),
        chunk_size
    );
    Ok(chunks)
}

/// Slide a `chunk_size`-word window over the text, advancing by
/// `chunk_size - overlap` words. The last window ends at the final word.
pub fn chunk_by_words(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(CondenseError::invalid_input("chunk size must be greater than 0"));
    }
    if overlap >= chunk_size {
        return Err(CondenseError::invalid_input(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }
    if words.len() <= chunk_size {
        debug!("Text is smaller than chunk size, returning as single chunk");
        return Ok(vec![words.join(" ")]);
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    debug!(
        "Created {} chunks from {} words (size {}, overlap {})",
        chunks.len(),
        words.len(),
        chunk_size,
        overlap
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_split_sentences_basic() {
        let sentences = split_sentences("First one. Second one! Third one? Trailing part");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third one?", "Trailing part"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_abbreviations() {
        let sentences =
            split_sentences("Mr. Smith moved to the U.S. last year. He works at Acme Inc. now.");
        assert_eq!(
            sentences,
            vec!["Mr. Smith moved to the U.S. last year.", "He works at Acme Inc. now."]
        );
    }

    #[test]
    fn test_split_sentences_requires_whitespace_after_mark() {
        let sentences = split_sentences("Version 2.5 shipped. See example.com for details.");
        assert_eq!(
            sentences,
            vec!["Version 2.5 shipped.", "See example.com for details."]
        );
    }

    #[test]
    fn test_split_sentences_skips_empty() {
        assert!(split_sentences("   ").is_empty());
        assert_eq!(split_sentences("Hi. . Bye."), vec!["Hi.", ".", "Bye."]);
    }

    #[test]
    fn test_chunk_by_sentences_packs_greedily() {
        let text = "One two three. Four five. Six seven eight nine. Ten.";
        let chunks = chunk_by_sentences(text, 5).unwrap();
        assert_eq!(
            chunks,
            vec!["One two three. Four five.", "Six seven eight nine. Ten."]
        );
    }

    #[test]
    fn test_chunk_by_sentences_oversized_sentence_stays_whole() {
        let text = "Short. This single sentence is clearly longer than the limit. End.";
        let chunks = chunk_by_sentences(text, 3).unwrap();
        assert_eq!(
            chunks,
            vec![
                "Short.",
                "This single sentence is clearly longer than the limit.",
                "End."
            ]
        );
    }

    #[test]
    fn test_chunk_by_sentences_normalizes_line_breaks() {
        let chunks = chunk_by_sentences("Line one\r\ncontinues. Line\ntwo.", 100).unwrap();
        assert_eq!(chunks, vec!["Line one continues. Line two."]);
    }

    #[test]
    fn test_chunk_by_sentences_covers_every_sentence_in_order() {
        let text = "Alpha beta. Gamma delta epsilon! Zeta? Eta theta iota kappa. Lambda mu. Nu.";
        let sentences = split_sentences(text);
        for size in 1..12 {
            let chunks = chunk_by_sentences(text, size).unwrap();
            let rejoined: Vec<String> = chunks
                .iter()
                .flat_map(|c| split_sentences(c))
                .collect();
            assert_eq!(rejoined, sentences, "chunk size {}", size);
        }
    }

    #[test]
    fn test_chunk_by_sentences_empty_and_invalid() {
        assert!(chunk_by_sentences("", 10).unwrap().is_empty());
        assert!(matches!(
            chunk_by_sentences("Text.", 0),
            Err(CondenseError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_chunk_by_words_short_text() {
        let chunks = chunk_by_words("  a   short\n\ntext ", 10, 2).unwrap();
        assert_eq!(chunks, vec!["a short text"]);
    }

    #[test]
    fn test_chunk_by_words_windows() {
        let text = numbered_words(10);
        let chunks = chunk_by_words(&text, 4, 1).unwrap();
        assert_eq!(
            chunks,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]
        );
    }

    #[test]
    fn test_chunk_by_words_last_window_clamped() {
        let text = numbered_words(11);
        let chunks = chunk_by_words(&text, 4, 1).unwrap();
        assert_eq!(chunks.last().unwrap(), "w9 w10");
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_chunk_by_words_overlap_membership() {
        let (k, o) = (7, 3);
        let step = k - o;
        let n = 30;
        let chunks = chunk_by_words(&numbered_words(n), k, o).unwrap();

        for p in 0..n {
            let word = format!("w{}", p);
            for (w, chunk) in chunks.iter().enumerate() {
                let expected = w * step <= p && p < w * step + k;
                let present = chunk.split(' ').any(|x| x == word);
                assert_eq!(present, expected, "word {} in window {}", p, w);
            }
        }
        assert!(chunks.last().unwrap().ends_with(&format!("w{}", n - 1)));
    }

    #[test]
    fn test_chunk_by_words_invalid_parameters() {
        assert!(matches!(
            chunk_by_words("a b c", 0, 0),
            Err(CondenseError::InvalidInput(_))
        ));
        assert!(matches!(
            chunk_by_words("a b c", 3, 3),
            Err(CondenseError::InvalidInput(_))
        ));
        assert!(chunk_by_words("", 3, 1).unwrap().is_empty());
    }

    #[test]
    fn test_into_segments_dense_positions() {
        let segments = into_segments(vec!["a".into(), "b".into(), "c".into()]);
        let positions: Vec<usize> = segments.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(segments[1].text, "b");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\nthree\t four "), 4);
        assert_eq!(word_count(""), 0);
    }
}
