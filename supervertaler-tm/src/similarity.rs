//! Sequence-similarity ratio used to rank fuzzy TM matches.
//!
//! Ported from Python's `difflib.SequenceMatcher.ratio()`, which
//! `database_manager.py::search_fuzzy_matches` uses to score FTS
//! candidates against the query. The Gestalt pattern-matching algorithm
//! (Ratcliff/Obershelp): recursively find the longest common matching
//! block and sum matching characters on both sides, then compute
//! `2 * matches / (len(a) + len(b))`.

/// Similarity ratio in `[0.0, 1.0]`, matching `difflib.SequenceMatcher.ratio()`.
pub fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matches = matching_blocks_total(&a, &b);
    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

fn matching_blocks_total(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, size) = longest_match(a, alo, ahi, b, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            stack.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Find the longest matching contiguous block within `a[alo..ahi]` and
/// `b[blo..bhi]`. Returns `(i, j, size)` of the match in absolute indices.
fn longest_match(
    a: &[char],
    alo: usize,
    ahi: usize,
    b: &[char],
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    use std::collections::HashMap;

    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = j2len.get(&j.wrapping_sub(1)).copied().unwrap_or(0) + 1;
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_perfect_matches() {
        assert_eq!(sequence_similarity("hello world", "hello world"), 1.0);
    }

    #[test]
    fn empty_strings_are_perfect_matches() {
        assert_eq!(sequence_similarity("", ""), 1.0);
    }

    #[test]
    fn completely_different_strings_score_zero() {
        assert_eq!(sequence_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn close_variants_score_highly() {
        let ratio = sequence_similarity("The cat sat on the mat", "The cat sits on the mat");
        assert!(ratio > 0.85, "expected high similarity, got {ratio}");
    }
}
