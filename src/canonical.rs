//! Instrument-name canonicalization.
//!
//! The canonical key is the join key for deduplicating holdings across
//! import sources, so two renderings of the same instrument (full-width vs
//! half-width, `・` vs space, with or without an index suffix) must produce
//! the same key, and the function must be idempotent.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const EMAXIS_SLIM: &str = "EMAXIS SLIM";
const ALL_WORLD_EQUITY: &str = "全世界株式";

fn all_country_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(?\s*オール[\s-]*カントリー\s*\)?").expect("valid all-country regex")
    })
}

fn index_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s?(?:インデックス\s?ファンド|INDEX\s?FUND|インデックス|INDEX)$")
            .expect("valid index suffix regex")
    })
}

fn fold_char(c: char) -> char {
    match c {
        '＆' => '&',
        '＋' => '+',
        '・' | '･' | '·' | '/' | '／' => ' ',
        '‐' | '‑' | '‒' | '–' | '—' | '―' | '−' | '－' | '﹣' => '-',
        other => other,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize instrument name text into a comparison-ready key.
/// `None` and blank input yield an empty key.
pub fn canonicalize<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else {
        return String::new();
    };
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let normalized: String = text.nfkc().map(fold_char).collect();
    // Upper-casing can leave text outside NFKC, so recompose afterwards.
    let upper = collapse_whitespace(&normalized).to_uppercase();
    let mut key: String = upper.nfkc().map(fold_char).collect();

    if key.contains(EMAXIS_SLIM) && key.contains(ALL_WORLD_EQUITY) {
        key = all_country_re().replace_all(&key, " ").into_owned();
    }
    key = collapse_whitespace(&key);

    // Repeat so "X INDEX INDEX" and "X INDEX" land on the same key.
    while let Some(m) = index_suffix_re().find(&key) {
        key.truncate(m.start());
        key = key.trim_end().to_string();
    }

    collapse_whitespace(&key)
}
