//! Translation-memory entries and match results.
//!
//! `TranslationUnit` and its uniqueness key are grounded on the
//! `translation_units` table in
//! `original_source/modules/database_manager.py`. `MatchScore` is a
//! secondary, Levenshtein-style scorer kept from the teacher repo's style
//! for quick single-string comparisons; the primary fuzzy-match ranking
//! used by `TmStore::fuzzy_match` is `sequence_similarity()` in
//! `crate::similarity`, grounded on `difflib.SequenceMatcher` as used by
//! `database_manager.py`'s `search_fuzzy_matches`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub id: i64,
    pub source_text: String,
    pub target_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub tm_id: String,
    pub project_id: Option<String>,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    pub source_hash: String,
    pub usage_count: i64,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl TranslationUnit {
    pub fn source_hash(source_text: &str) -> String {
        format!("{:x}", md5::compute(source_text.as_bytes()))
    }
}

/// One TM lookup result, carrying the retrieval mode it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationMatch {
    pub unit: TranslationUnit,
    /// `1.0` for exact matches; in `[0, 1)` similarity for fuzzy matches.
    pub similarity: f64,
    /// `floor(similarity * 100)`.
    pub match_pct: u32,
    /// Set when the match was found via the bidirectional reverse query;
    /// the caller may swap `source_text`/`target_text` to present it in
    /// project direction.
    pub reverse_match: bool,
}

impl TranslationMatch {
    pub fn new(unit: TranslationUnit, similarity: f64, reverse_match: bool) -> Self {
        let match_pct = (similarity * 100.0).floor().max(0.0) as u32;
        Self {
            unit,
            similarity,
            match_pct,
            reverse_match,
        }
    }
}

/// A simple normalised-edit-distance score, `[0.0, 1.0]`, used for quick
/// single-string comparisons (e.g. ranking tracked-change relevance) where
/// the full FTS-plus-sequence-similarity pipeline of `TmStore` would be
/// overkill.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MatchScore(pub f64);

impl MatchScore {
    pub fn calculate(a: &str, b: &str) -> Self {
        if a.is_empty() && b.is_empty() {
            return MatchScore(1.0);
        }
        let distance = levenshtein_distance(a, b);
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return MatchScore(1.0);
        }
        MatchScore(1.0 - (distance as f64 / max_len as f64))
    }

    pub fn percentage(&self) -> u32 {
        (self.0 * 100.0).round().clamp(0.0, 100.0) as u32
    }

    pub fn is_exact(&self) -> bool {
        self.0 >= 0.999
    }

    pub fn is_high_quality(&self) -> bool {
        self.0 >= 0.85
    }

    pub fn is_good(&self) -> bool {
        self.0 >= 0.70
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());
    let mut row: Vec<usize> = (0..=lb).collect();

    for i in 1..=la {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=lb {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[lb]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_exact() {
        let score = MatchScore::calculate("hello world", "hello world");
        assert!(score.is_exact());
        assert_eq!(score.percentage(), 100);
    }

    #[test]
    fn source_hash_is_stable() {
        let h1 = TranslationUnit::source_hash("Hello, world!");
        let h2 = TranslationUnit::source_hash("Hello, world!");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32);
    }
}
