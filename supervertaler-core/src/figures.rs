//! Figure reference normalisation and the figure image lookup map, ported
//! from `normalize_figure_ref` in
//! `original_source/Supervertaler_v2.5.0.py`.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::error::Result;

/// `normalized_figure_id → image bytes`, built by scanning a directory of
/// figure image files.
#[derive(Debug, Clone, Default)]
pub struct FigureImageMap {
    images: HashMap<String, Vec<u8>>,
}

impl FigureImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every image file in `dir` (non-recursive), keying each by its
    /// filename stem normalised the same way a figure reference is.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut map = Self::default();
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(map);
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = normalize_stem(stem);
            let bytes = std::fs::read(&path)?;
            map.images.insert(key, bytes);
        }
        Ok(map)
    }

    pub fn get(&self, normalized_id: &str) -> Option<&[u8]> {
        self.images.get(normalized_id).map(|v| v.as_slice())
    }

    pub fn contains(&self, normalized_id: &str) -> bool {
        self.images.contains_key(normalized_id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn figure_reference_regex() -> Regex {
    Regex::new(r"(?i)(?:figure|figuur|fig\.?)\s*([\w\d]+(?:[\s.\-]*[\w\d]+)?)").unwrap()
}

/// Find the first figure reference in `text` and return its normalised
/// id (separators stripped, lowercased), or `None` if no reference is
/// present.
pub fn find_figure_reference(text: &str) -> Option<String> {
    let re = figure_reference_regex();
    let caps = re.captures(text)?;
    let raw = caps.get(1)?.as_str();
    Some(normalize_figure_id(raw))
}

/// Every figure reference found in `text`, in order of appearance.
pub fn find_all_figure_references(text: &str) -> Vec<String> {
    let re = figure_reference_regex();
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| normalize_figure_id(m.as_str())))
        .collect()
}

fn normalize_figure_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '.' | '-'))
        .collect::<String>()
        .to_lowercase()
}

/// Normalise a bare filename stem, e.g. `"Fig-2b"` → `"2b"`. Tries the
/// figure-reference regex first (covers stems like `"Figure 1A"`); when a
/// separator directly follows the figure word with no intervening
/// whitespace (`"Fig-2B"`), the regex's `\s*` gap doesn't match, so this
/// falls back to manually stripping a leading `figure`/`figuur`/`fig.`
/// word before normalising the remainder.
fn normalize_stem(stem: &str) -> String {
    if let Some(id) = find_figure_reference(stem) {
        return id;
    }
    let lower = stem.to_lowercase();
    let stripped = ["figure", "figuur", "fig."]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .or_else(|| lower.strip_prefix("fig"))
        .unwrap_or(&lower);
    normalize_figure_id(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_figure_with_letter_suffix() {
        assert_eq!(find_figure_reference("see Figure 1A for details"), Some("1a".to_string()));
    }

    #[test]
    fn normalizes_dutch_figuur_and_abbreviated_fig() {
        assert_eq!(find_figure_reference("Figuur 3"), Some("3".to_string()));
        assert_eq!(find_figure_reference("Fig. 2-b"), Some("2b".to_string()));
    }

    #[test]
    fn no_reference_returns_none() {
        assert_eq!(find_figure_reference("nothing relevant here"), None);
    }

    #[test]
    fn find_all_returns_every_reference_in_order() {
        let refs = find_all_figure_references("see Figure 1 and also Figure 2b later");
        assert_eq!(refs, vec!["1".to_string(), "2b".to_string()]);
    }

    #[test]
    fn load_dir_normalizes_filenames_as_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Fig-2B.png"), b"fake png bytes").unwrap();
        let map = FigureImageMap::load_dir(dir.path()).unwrap();
        assert!(map.contains("2b"));
        assert_eq!(map.get("2b"), Some(b"fake png bytes".as_slice()));
    }
}
