use std::time::Instant;

use super::{Scanner, matches_at};
use crate::error::TallyError;
use crate::types::{Corpus, Method, Pattern, ScanResult};

/// Single-threaded scan over the whole corpus. The reference every other
/// backend is checked against.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialScanner;

impl Scanner for SerialScanner {
    fn method(&self) -> Method {
        Method::SerialCpu
    }

    fn count(&self, corpus: &Corpus, pattern: &Pattern) -> Result<u64, TallyError> {
        Ok(count_occurrences(corpus.bytes(), pattern.as_bytes()))
    }
}

/// Count overlapping occurrences of `pattern` in `text`, timed.
#[must_use]
pub fn scan_serial(text: &[u8], pattern: &[u8]) -> ScanResult {
    let start = Instant::now();
    let count = count_occurrences(text, pattern);
    ScanResult::counted(count, start.elapsed())
}

/// Count overlapping occurrences: every start offset is tried, and the scan
/// advances by one byte after a match, so `"aa"` occurs twice in `"aaa"`.
///
/// Returns 0 without touching the text when the pattern is empty or longer
/// than the text.
#[must_use]
pub fn count_occurrences(text: &[u8], pattern: &[u8]) -> u64 {
    let Some(&first) = pattern.first() else {
        return 0;
    };
    if pattern.len() > text.len() {
        return 0;
    }
    let last_start = text.len() - pattern.len();

    let mut count = 0;
    let mut offset = 0;
    // memchr (SIMD) skips straight to offsets whose first byte could match
    while let Some(i) = memchr::memchr(first, &text[offset..=last_start]) {
        let at = offset + i;
        if matches_at(text, at, pattern) {
            count += 1;
        }
        offset = at + 1;
        if offset > last_start {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(text: &str, pattern: &str) -> u64 {
        count_occurrences(text.as_bytes(), pattern.as_bytes())
    }

    #[test]
    fn overlapping_matches_counted() {
        assert_eq!(count("aaaa", "aa"), 3);
        assert_eq!(count("aaa", "aa"), 2);
        assert_eq!(count("abababa", "aba"), 3);
    }

    #[test]
    fn no_match() {
        assert_eq!(count("hello world", "xyz"), 0);
    }

    #[test]
    fn pattern_longer_than_text() {
        assert_eq!(count("ab", "abcd"), 0);
        assert_eq!(count("", "a"), 0);
    }

    #[test]
    fn empty_pattern_counts_nothing() {
        assert_eq!(count("abc", ""), 0);
    }

    #[test]
    fn match_at_both_ends() {
        assert_eq!(count("fox and fox", "fox"), 2);
        assert_eq!(count("fox", "fox"), 1);
    }

    #[test]
    fn crosses_line_breaks() {
        // Whole-text scan sees matches straddling a newline
        assert_eq!(count("ab\ncd", "b\nc"), 1);
        assert_eq!(count("the\nthe", "the"), 2);
    }

    #[test]
    fn case_sensitive() {
        assert_eq!(count("Fox fox FOX", "fox"), 1);
    }

    #[test]
    fn multibyte_utf8_is_bytes() {
        assert_eq!(count("ação ação", "ção"), 2);
        assert_eq!(count("ç", "\u{00e7}"), 1);
    }

    #[test]
    fn scan_serial_wraps_count() {
        let r = scan_serial(b"aaaa", b"aa");
        assert_eq!(r.count, 3);
        assert!(!r.is_unavailable());
    }

    #[test]
    fn scanner_repeatable() {
        let corpus = Corpus::new(b"the cat sat on the mat".to_vec());
        let pattern = Pattern::new("at").unwrap();
        let a = SerialScanner.count(&corpus, &pattern).unwrap();
        let b = SerialScanner.count(&corpus, &pattern).unwrap();
        assert_eq!(a, 3);
        assert_eq!(a, b);
    }
}
