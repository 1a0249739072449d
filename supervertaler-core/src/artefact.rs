//! Output artefact emission: translate/proofread TXT, TMX, and the
//! run-report Markdown.
//!
//! The TXT column layouts and the run-report field list are specified
//! directly by spec §4.J (no direct `original_source` equivalent: that
//! source logs to a scrolling `log_queue` rather than writing a
//! structured report). TMX emission delegates to
//! `supervertaler_tm::tmx_codec::write_tmx`, which already implements the
//! error-marker/empty-target skip rules.

use std::path::Path;

use chrono::{DateTime, Utc};
use supervertaler_tm::tmx_codec::{write_tmx, TmxPair};

use crate::config::{ProviderHint, RunMode};
use crate::error::Result;
use crate::llm::{is_placeholder, RunOutcome};

const NO_SUMMARY_PROVIDED: &str = "No summary provided";

/// One row of translate-mode output: `source<TAB>target`.
#[derive(Debug, Clone)]
pub struct TranslateRow {
    pub source: String,
    pub target: String,
}

/// One row of proofread-mode output, carrying enough to build the
/// `comment` column per spec §4.J.
#[derive(Debug, Clone)]
pub struct ProofreadRow {
    pub source: String,
    pub original_target: String,
    pub revised_target: String,
    pub original_comment: Option<String>,
    pub changes_summary: Option<String>,
}

impl ProofreadRow {
    /// `"ORIGINAL COMMENT: …"` and, when the revised target differs from
    /// the original, `"PROOFREADER COMMENT (AI): <summary-or-default>"`,
    /// joined with `" | "`.
    fn comment_column(&self) -> String {
        let mut parts = Vec::new();
        if let Some(original) = &self.original_comment {
            if !original.is_empty() {
                parts.push(format!("ORIGINAL COMMENT: {original}"));
            }
        }
        if self.revised_target.trim() != self.original_target.trim() {
            let summary = self.changes_summary.as_deref().filter(|s| !s.is_empty()).unwrap_or(NO_SUMMARY_PROVIDED);
            parts.push(format!("PROOFREADER COMMENT (AI): {summary}"));
        }
        parts.join(" | ")
    }
}

pub struct ArtefactWriter;

impl ArtefactWriter {
    /// `source<TAB>target\n` per row.
    pub fn write_translate_txt(path: impl AsRef<Path>, rows: &[TranslateRow]) -> Result<()> {
        let mut out = String::new();
        for row in rows {
            out.push_str(&row.source);
            out.push('\t');
            out.push_str(&row.target);
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// `source<TAB>revised_target<TAB>comment\n` per row.
    pub fn write_proofread_txt(path: impl AsRef<Path>, rows: &[ProofreadRow]) -> Result<()> {
        let mut out = String::new();
        for row in rows {
            out.push_str(&row.source);
            out.push('\t');
            out.push_str(&row.revised_target);
            out.push('\t');
            out.push_str(&row.comment_column());
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Translate-only artefact, alongside the TXT with the same basename.
    /// Skips orchestrator placeholder/error markers (`[TL Missing line N]`,
    /// `[TL Err line N: …]`, `[Err: …]`) before handing the rest to
    /// `write_tmx`, which separately skips empty sources/targets per
    /// spec §4.G.
    pub fn write_tmx(path: impl AsRef<Path>, rows: &[TranslateRow], source_lang: &str, target_lang: &str) -> Result<()> {
        let pairs: Vec<TmxPair> = rows
            .iter()
            .filter(|r| !is_placeholder(&r.target))
            .map(|r| TmxPair { source: r.source.clone(), target: r.target.clone() })
            .collect();
        let xml = write_tmx(&pairs, source_lang, target_lang)?;
        std::fs::write(path, xml)?;
        Ok(())
    }
}

/// Everything the run-report Markdown names per spec §4.J.
pub struct RunReport<'a> {
    pub timestamp: DateTime<Utc>,
    pub version: &'a str,
    pub mode: RunMode,
    pub provider: ProviderHint,
    pub model: &'a str,
    pub source_path: &'a str,
    pub output_dir: &'a str,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
    pub chunk_size: usize,
    pub tm_ids: &'a [String],
    pub figures_dir: Option<&'a str>,
    pub tracked_change_sources: &'a [String],
    pub system_prompt_sent: &'a str,
    pub custom_instructions: &'a str,
    pub outcome: &'a RunOutcome,
}

impl<'a> RunReport<'a> {
    /// Always written on any outcome short of fatal initialisation failure.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();

        let _ = writeln!(out, "# Supervertaler Run Report");
        let _ = writeln!(out);
        let _ = writeln!(out, "- **Timestamp**: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(out, "- **Version**: {}", self.version);
        let _ = writeln!(out, "- **Mode**: {}", mode_label(self.mode));
        let _ = writeln!(out, "- **Provider / model**: {:?} / {}", self.provider, self.model);
        let _ = writeln!(out, "- **Source file**: {}", self.source_path);
        let _ = writeln!(out, "- **Output directory**: {}", self.output_dir);
        let _ = writeln!(out, "- **Language pair**: {} → {}", self.source_lang, self.target_lang);
        let _ = writeln!(out, "- **Chunk size**: {}", self.chunk_size);
        let _ = writeln!(out);

        let _ = writeln!(out, "## Optional resources");
        let _ = writeln!(
            out,
            "- Translation memories: {}",
            if self.tm_ids.is_empty() { "none".to_string() } else { self.tm_ids.join(", ") }
        );
        let _ = writeln!(out, "- Figures directory: {}", self.figures_dir.unwrap_or("none"));
        let _ = writeln!(
            out,
            "- Tracked-change sources: {}",
            if self.tracked_change_sources.is_empty() {
                "none".to_string()
            } else {
                self.tracked_change_sources.join(", ")
            }
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "## System prompt (as sent)");
        let _ = writeln!(out, "```\n{}\n```", self.system_prompt_sent);
        let _ = writeln!(out);

        let _ = writeln!(out, "## Custom instructions");
        if self.custom_instructions.trim().is_empty() {
            let _ = writeln!(out, "_none_");
        } else {
            let _ = writeln!(out, "```\n{}\n```", self.custom_instructions);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "## Outcome");
        let _ = writeln!(out, "- **Status**: {:?}", self.outcome.status);
        let _ = writeln!(out, "- **Total lines**: {}", self.outcome.total_lines);
        let _ = writeln!(out, "- **Placeholder lines**: {}", self.outcome.placeholder_count);
        if self.mode == RunMode::Proofread {
            let _ = writeln!(out, "- **Modified lines**: {}", self.outcome.modified_lines);
        }

        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

fn mode_label(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Translate => "Translate",
        RunMode::Proofread => "Proofread",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::RunStatus;

    #[test]
    fn translate_txt_writes_tab_separated_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let rows = vec![
            TranslateRow { source: "Hello".to_string(), target: "Bonjour".to_string() },
            TranslateRow { source: "World".to_string(), target: "Monde".to_string() },
        ];
        ArtefactWriter::write_translate_txt(&path, &rows).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Hello\tBonjour\nWorld\tMonde\n");
    }

    #[test]
    fn proofread_comment_column_combines_original_and_ai_comment() {
        let row = ProofreadRow {
            source: "Hi".to_string(),
            original_target: "Salut".to_string(),
            revised_target: "Bonjour".to_string(),
            original_comment: Some("reviewer note".to_string()),
            changes_summary: Some("tightened phrasing".to_string()),
        };
        assert_eq!(row.comment_column(), "ORIGINAL COMMENT: reviewer note | PROOFREADER COMMENT (AI): tightened phrasing");
    }

    #[test]
    fn proofread_comment_column_omits_ai_comment_when_unchanged() {
        let row = ProofreadRow {
            source: "Hi".to_string(),
            original_target: "Salut".to_string(),
            revised_target: "Salut".to_string(),
            original_comment: None,
            changes_summary: None,
        };
        assert_eq!(row.comment_column(), "");
    }

    #[test]
    fn proofread_comment_column_uses_default_when_summary_missing() {
        let row = ProofreadRow {
            source: "Hi".to_string(),
            original_target: "Salut".to_string(),
            revised_target: "Bonjour".to_string(),
            original_comment: None,
            changes_summary: None,
        };
        assert_eq!(row.comment_column(), "PROOFREADER COMMENT (AI): No summary provided");
    }

    #[test]
    fn tmx_artefact_skips_error_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tmx");
        let rows = vec![
            TranslateRow { source: "Hello".to_string(), target: "Bonjour".to_string() },
            TranslateRow { source: "Broken".to_string(), target: "[TL Err line 2: timeout]".to_string() },
        ];
        ArtefactWriter::write_tmx(&path, &rows, "en", "fr").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Bonjour"));
        assert!(!contents.contains("timeout"));
    }

    #[test]
    fn run_report_includes_required_fields() {
        let outcome = RunOutcome { status: RunStatus::PartialSuccess, total_lines: 10, placeholder_count: 2, modified_lines: 0 };
        let report = RunReport {
            timestamp: Utc::now(),
            version: "0.1.0",
            mode: RunMode::Translate,
            provider: ProviderHint::Gemini,
            model: "gemini-test",
            source_path: "input.docx",
            output_dir: "out/",
            source_lang: "en",
            target_lang: "nl",
            chunk_size: 100,
            tm_ids: &["project-tm".to_string()],
            figures_dir: Some("figures/"),
            tracked_change_sources: &[],
            system_prompt_sent: "Translate en to nl.",
            custom_instructions: "",
            outcome: &outcome,
        };
        let markdown = report.render();
        assert!(markdown.contains("Supervertaler Run Report"));
        assert!(markdown.contains("PartialSuccess"));
        assert!(markdown.contains("project-tm"));
        assert!(markdown.contains("Translate en to nl."));
    }
}
