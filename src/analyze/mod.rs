// src/analyze/mod.rs
//! Headline analysis: category classification, model adapter, and the concurrent
//! per-headline fan-out. Shared text helpers live here.

pub mod classifier;
pub mod fanout;
pub mod hf;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

pub use classifier::{FallbackClassifier, HeadlineClassifier, KeywordClassifier, ZeroShotClassifier};
pub use fanout::{classify_all, DropReason, DroppedHeadline, FanoutOptions, FanoutOutcome};

/// Short anonymized id for log lines; raw headline text is never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Lower-cased word tokens; apostrophes stay inside words so "isn't" survives.
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '’'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase().replace('’', "'"))
}

/// Does `text` mention `ticker` as a standalone symbol (`AAPL`, `$AAPL`, `BRK.B`)?
pub fn mentions_ticker(text: &str, ticker: &str) -> bool {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return false;
    }
    static SYMBOL: OnceCell<Regex> = OnceCell::new();
    let re = SYMBOL.get_or_init(|| {
        Regex::new(r"\$?[A-Za-z][A-Za-z0-9]*(?:[.\-][A-Za-z0-9]+)?").expect("symbol regex")
    });
    re.find_iter(text).any(|m| {
        m.as_str()
            .trim_start_matches('$')
            .eq_ignore_ascii_case(ticker)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_contractions() {
        let toks: Vec<String> = tokenize("Apple isn't cutting guidance—stronger-than-expected!").collect();
        assert_eq!(
            toks,
            vec!["apple", "isn't", "cutting", "guidance", "stronger", "than", "expected"]
        );
    }

    #[test]
    fn ticker_mentions() {
        assert!(mentions_ticker("AAPL posts stronger-than-expected results", "AAPL"));
        assert!(mentions_ticker("Why $aapl is moving", "AAPL"));
        assert!(mentions_ticker("BRK.B hits record", "BRK.B"));
        assert!(!mentions_ticker("Pineapple prices soar", "APPL"));
        assert!(!mentions_ticker("Sector peers rally", ""));
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("headline");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("headline"));
    }
}
