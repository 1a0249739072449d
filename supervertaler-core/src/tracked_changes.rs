//! Mining `(original, final)` pairs from revision markup or TSV corpora,
//! and serving the subset relevant to a chunk of segments.
//!
//! Grounded on `original_source/Supervertaler_v2.5.0.py`'s tracked-change
//! loading; the TSV ingestion rule and relevance query are built directly
//! from spec text (see SPEC_FULL.md §4.C for the grounding note on why the
//! Python `load_tsv_changes` is not followed verbatim).

use std::collections::HashSet;
use std::path::Path;

use zip::ZipArchive;

use crate::docx::collect_text::{collect_text, tidy_text, ExtractMode};
use crate::docx::xml_tree::parse_document;
use crate::error::{CoreError, Result};

/// A mined `(original, final)` pair, `original != final` by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedChangePair {
    pub original: String,
    pub r#final: String,
}

#[derive(Default)]
pub struct TrackedChangeExtractor {
    pairs: Vec<TrackedChangePair>,
}

impl TrackedChangeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-mined set of pairs (e.g. a project's full tracked-change
    /// corpus) so `relevant_for` can be queried against it directly.
    pub fn from_pairs(pairs: Vec<TrackedChangePair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[TrackedChangePair] {
        &self.pairs
    }

    /// Mine every paragraph of `document.xml` whose tidy original and
    /// final text differ.
    pub fn load_docx(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut archive = ZipArchive::new(file)?;
        let mut contents = String::new();
        {
            use std::io::Read as _;
            let mut entry = archive
                .by_name("word/document.xml")
                .map_err(|_| CoreError::InvalidDocx)?;
            entry.read_to_string(&mut contents)?;
        }
        let root = parse_document(contents.as_bytes())?;
        let mut paragraphs = Vec::new();
        root.find_all("p", &mut paragraphs);

        let mut added = 0;
        for p in paragraphs {
            let original = tidy_text(&collect_text(p, ExtractMode::Original));
            let r#final = tidy_text(&collect_text(p, ExtractMode::Final));
            if original != r#final && !original.is_empty() {
                self.pairs.push(TrackedChangePair { original, r#final });
                added += 1;
            }
        }
        Ok(added)
    }

    /// Ingest a TSV corpus: `original<TAB>final` per line. Blank lines
    /// skipped. The first line is treated as a header (and dropped) only
    /// if it contains both "original" and "final", case-insensitively.
    /// Lines without a tab are rejected with a logged warning.
    pub fn load_tsv(&mut self, contents: &str) -> usize {
        let mut added = 0;
        let mut lines = contents.lines().peekable();

        if let Some(first) = lines.peek() {
            let lower = first.to_lowercase();
            if lower.contains("original") && lower.contains("final") {
                lines.next();
            }
        }

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let Some((original, r#final)) = line.split_once('\t') else {
                log::warn!("tracked-change TSV line missing a tab, skipping: {line:?}");
                continue;
            };
            let original = original.trim().to_string();
            let r#final = r#final.trim().to_string();
            if original != r#final {
                self.pairs.push(TrackedChangePair { original, r#final });
                added += 1;
            }
        }
        added
    }

    /// Up to `limit` pairs relevant to `source_segments`: exact
    /// case-insensitive matches first, then pairs sharing at least two
    /// significant tokens (length > 3, lowercased) with any segment, or at
    /// least half of that segment's significant tokens. Stable
    /// de-duplication; insertion order preserved within each tier.
    pub fn relevant_for(&self, source_segments: &[&str], limit: usize) -> Vec<TrackedChangePair> {
        if limit == 0 || self.pairs.is_empty() {
            return Vec::new();
        }

        let segment_lower: Vec<String> = source_segments.iter().map(|s| s.to_lowercase()).collect();
        let segment_tokens: Vec<HashSet<String>> = segment_lower.iter().map(|s| significant_tokens(s)).collect();

        let mut seen = HashSet::new();
        let mut exact = Vec::new();
        let mut fuzzy = Vec::new();

        for pair in &self.pairs {
            let key = (pair.original.clone(), pair.r#final.clone());
            if seen.contains(&key) {
                continue;
            }
            let original_lower = pair.original.to_lowercase();

            if segment_lower.iter().any(|s| s == &original_lower) {
                exact.push(pair.clone());
                seen.insert(key);
                continue;
            }

            let pair_tokens = significant_tokens(&original_lower);
            if pair_tokens.is_empty() {
                continue;
            }
            let relevant = segment_tokens.iter().any(|seg_tokens| {
                if seg_tokens.is_empty() {
                    return false;
                }
                let shared = pair_tokens.intersection(seg_tokens).count();
                shared >= 2 || shared * 2 >= seg_tokens.len()
            });
            if relevant {
                fuzzy.push(pair.clone());
                seen.insert(key);
            }
        }

        exact.extend(fuzzy);
        exact.truncate(limit);
        exact
    }
}

fn significant_tokens(lower: &str) -> HashSet<String> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.len() > 3)
        .map(|tok| tok.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use zip::write::{FileOptions, ZipWriter};

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = ZipWriter::new(cursor);
            let options = FileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn mines_original_final_pair_from_tracked_change_paragraph() {
        let xml = r#"<w:document xmlns:w="ns"><w:body><w:p>
            <w:r><w:t>Hello </w:t></w:r>
            <w:del><w:r><w:delText>old </w:delText></w:r></w:del>
            <w:ins><w:r><w:t>new </w:t></w:r></w:ins>
            <w:r><w:t>world.</w:t></w:r>
        </w:p></w:body></w:document>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked.docx");
        std::fs::write(&path, build_docx(xml)).unwrap();

        let mut extractor = TrackedChangeExtractor::new();
        let added = extractor.load_docx(&path).unwrap();
        assert_eq!(added, 1);
        assert_eq!(extractor.pairs()[0].original, "Hello old world.");
        assert_eq!(extractor.pairs()[0].r#final, "Hello new world.");
    }

    #[test]
    fn tsv_header_detected_only_when_both_words_present() {
        let mut extractor = TrackedChangeExtractor::new();
        let added = extractor.load_tsv("Original\tFinal\nfoo\tbar\n\nbaz\tqux\n");
        assert_eq!(added, 2);
        assert_eq!(extractor.pairs()[0].original, "foo");
    }

    #[test]
    fn tsv_without_header_keeps_first_line_as_data() {
        let mut extractor = TrackedChangeExtractor::new();
        let added = extractor.load_tsv("alpha\tbeta\ngamma\tdelta\n");
        assert_eq!(added, 2);
        assert_eq!(extractor.pairs()[0].original, "alpha");
    }

    #[test]
    fn tsv_line_without_tab_is_skipped() {
        let mut extractor = TrackedChangeExtractor::new();
        let added = extractor.load_tsv("original\tfinal\nno tab here\nfoo\tbar\n");
        assert_eq!(added, 1);
    }

    #[test]
    fn relevant_for_prefers_exact_matches_over_fuzzy() {
        let mut extractor = TrackedChangeExtractor::new();
        extractor.load_tsv(
            "original\tfinal\n\
             The quick brown fox\tDe snelle bruine vos\n\
             Something entirely unrelated text\tIets compleet anders\n",
        );
        let hits = extractor.relevant_for(&["The quick brown fox"], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].original, "The quick brown fox");
    }

    #[test]
    fn relevant_for_respects_limit() {
        let mut extractor = TrackedChangeExtractor::new();
        extractor.load_tsv("original\tfinal\nfoo bar baz qux\ttranslated one\nfoo bar baz other\ttranslated two\n");
        let hits = extractor.relevant_for(&["foo bar baz qux"], 1);
        assert_eq!(hits.len(), 1);
    }
}
