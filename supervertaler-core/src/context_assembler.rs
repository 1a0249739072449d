//! Builds the ordered prompt content list consumed by any `LLMClient`.
//!
//! Grounded on spec §4.H's eight-step ordering contract, with the figure
//! regex and the tracked-change excerpt cap ported from
//! `normalize_figure_ref`/`format_tracked_changes_context` in
//! `original_source/Supervertaler_v2.5.0.py`.

use std::collections::HashSet;

use regex::Regex;

use supervertaler_tm::NonTranslatablePattern;

use crate::config::RunMode;
use crate::figures::{find_figure_reference, FigureImageMap};
use crate::tracked_changes::TrackedChangePair;

/// Fallback used whenever a caller's template is empty or carries an
/// unrecognised `{placeholder}`, and the default offered to a CLI run
/// with no `--system-prompt-file`.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a professional translator. Translate the numbered source lines from {source_lang} \
     into {target_lang}, preserving meaning, tone, and formatting exactly.";

const TRACKED_CHANGE_CAP: usize = 1000;

/// One item of the ordered content list handed to `LLMClient::generate`.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Image { bytes: Vec<u8>, mime: &'static str },
}

/// One segment to translate or proofread within a chunk.
#[derive(Debug, Clone)]
pub struct ChunkSegment {
    pub line_number: u32,
    pub source: String,
    /// Present (and used) only in `RunMode::Proofread`.
    pub existing_target: Option<String>,
}

/// Everything `ContextAssembler::build` needs to produce one chunk's
/// content list.
pub struct ChunkRequest<'a> {
    pub mode: RunMode,
    pub system_prompt_template: &'a str,
    pub custom_instructions: &'a str,
    /// Project-scoped "never touch this span" patterns, surfaced
    /// immediately after custom instructions; empty by default.
    pub non_translatable_patterns: &'a [NonTranslatablePattern],
    pub tracked_changes: &'a [TrackedChangePair],
    /// Numbered (1-based), full-document source lines, in order.
    pub full_source_context: &'a [(u32, String)],
    /// Numbered full-document target lines; required for `Proofread`.
    pub full_target_context: Option<&'a [(u32, String)]>,
    /// Segments in this chunk, already sorted by ascending `line_number`.
    pub chunk_segments: &'a [ChunkSegment],
    pub figure_map: &'a FigureImageMap,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
}

pub struct ContextAssembler;

impl ContextAssembler {
    pub fn build(request: &ChunkRequest) -> Vec<ContentItem> {
        let mut content = Vec::new();

        content.push(ContentItem::Text(expand_system_prompt(
            request.system_prompt_template,
            request.source_lang,
            request.target_lang,
        )));

        if !request.custom_instructions.trim().is_empty() {
            content.push(ContentItem::Text(request.custom_instructions.to_string()));
        }

        if let Some(block) = format_non_translatables(request.non_translatable_patterns) {
            content.push(ContentItem::Text(block));
        }

        let tracked = format_tracked_changes_context(request.tracked_changes, TRACKED_CHANGE_CAP);
        if !tracked.is_empty() {
            content.push(ContentItem::Text(tracked));
        }

        content.push(ContentItem::Text(chunk_protocol_text()));

        content.push(ContentItem::Text(format_full_context_block(
            "FULL SOURCE DOCUMENT CONTEXT (reference only)",
            request.full_source_context,
        )));

        if request.mode == RunMode::Proofread {
            let target_context = request.full_target_context.unwrap_or(&[]);
            content.push(ContentItem::Text(format_full_context_block(
                "FULL EXISTING TRANSLATION CONTEXT (reference only)",
                target_context,
            )));
        }

        let mut figures_added: HashSet<String> = HashSet::new();
        for segment in request.chunk_segments {
            if let Some(figure_id) = find_figure_reference(&segment.source) {
                if !figures_added.contains(&figure_id) {
                    if let Some(bytes) = request.figure_map.get(&figure_id) {
                        content.push(ContentItem::Text(format!(
                            "(Image attached for figure reference \"{figure_id}\")"
                        )));
                        content.push(ContentItem::Image { bytes: bytes.to_vec(), mime: "image/png" });
                    }
                    figures_added.insert(figure_id);
                }
            }

            match request.mode {
                RunMode::Translate => {
                    content.push(ContentItem::Text(format!("{}. {}", segment.line_number, segment.source)));
                }
                RunMode::Proofread => {
                    content.push(ContentItem::Text(format!(
                        "{}. SOURCE: {}",
                        segment.line_number, segment.source
                    )));
                    content.push(ContentItem::Text(format!(
                        "{}. EXISTING TRANSLATION: {}",
                        segment.line_number,
                        segment.existing_target.as_deref().unwrap_or("")
                    )));
                }
            }
        }

        content.push(ContentItem::Text(final_instruction_text(request.mode)));

        content
    }
}

fn expand_system_prompt(template: &str, source_lang: &str, target_lang: &str) -> String {
    let placeholder = Regex::new(r"\{([a-zA-Z_]+)\}").unwrap();
    let unknown = placeholder
        .captures_iter(template)
        .any(|c| !matches!(&c[1], "source_lang" | "target_lang"));

    let effective = if unknown {
        log::warn!("system prompt template contains unrecognised placeholders, falling back to default");
        DEFAULT_SYSTEM_PROMPT
    } else {
        template
    };

    effective.replace("{source_lang}", source_lang).replace("{target_lang}", target_lang)
}

/// Render enabled non-translatable patterns as a block the LLM is told to
/// leave untouched wherever they occur; `None` when there are none.
fn format_non_translatables(patterns: &[NonTranslatablePattern]) -> Option<String> {
    let enabled: Vec<&NonTranslatablePattern> = patterns.iter().filter(|p| p.enabled).collect();
    if enabled.is_empty() {
        return None;
    }
    let mut out = String::from("NON-TRANSLATABLE PATTERNS (copy these spans verbatim, do not translate them):\n");
    for pattern in enabled {
        out.push_str(&format!("\u{2022} {}", pattern.pattern));
        if !pattern.description.is_empty() {
            out.push_str(&format!(" — {}", pattern.description));
        }
        out.push('\n');
    }
    Some(out)
}

/// Ported from `format_tracked_changes_context`.
fn format_tracked_changes_context(pairs: &[TrackedChangePair], max_length: usize) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let header = "TRACKED CHANGES REFERENCE (Original→Final editing patterns):";
    let mut parts = vec![header.to_string()];
    let mut current_length = header.len();

    for (i, pair) in pairs.iter().enumerate() {
        let change_text = format!("\u{2022} \"{}\" \u{2192} \"{}\"", pair.original, pair.r#final);
        if current_length + change_text.len() > max_length {
            if i > 0 {
                parts.push("(Additional examples truncated to save space)".to_string());
            }
            break;
        }
        current_length += change_text.len();
        parts.push(change_text);
    }

    format!("{}\n", parts.join("\n"))
}

fn chunk_protocol_text() -> String {
    "The FULL DOCUMENT CONTEXT blocks above are for reference only, to understand surrounding \
     meaning. Translate or revise ONLY the numbered lines that follow this message; do not add, \
     remove, or renumber lines."
        .to_string()
}

fn format_full_context_block(label: &str, lines: &[(u32, String)]) -> String {
    let mut out = format!("{label}:\n");
    for (n, text) in lines {
        out.push_str(&format!("{n}. {text}\n"));
    }
    out
}

fn final_instruction_text(mode: RunMode) -> String {
    match mode {
        RunMode::Translate => {
            "Output ONLY a numbered list covering exactly the line numbers supplied above, one \
             translation per line, in the same numbering."
                .to_string()
        }
        RunMode::Proofread => {
            "Output ONLY a numbered list covering exactly the line numbers supplied above, one \
             revised translation per line, in the same numbering. After the list, emit a block:\n\
             ---CHANGES SUMMARY START---\n\
             one line per modified segment id describing the change, or the single line \"No \
             changes made to any segment in this batch.\" if nothing changed\n\
             ---CHANGES SUMMARY END---"
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tracked_changes() -> Vec<TrackedChangePair> {
        vec![TrackedChangePair { original: "Hello old world.".to_string(), r#final: "Hello new world.".to_string() }]
    }

    #[test]
    fn build_orders_content_per_the_eight_step_contract() {
        let figures = FigureImageMap::new();
        let tracked = sample_tracked_changes();
        let full_source = vec![(1, "First line.".to_string()), (2, "Second line.".to_string())];
        let segments = vec![ChunkSegment { line_number: 2, source: "Second line.".to_string(), existing_target: None }];

        let request = ChunkRequest {
            mode: RunMode::Translate,
            system_prompt_template: "Translate {source_lang} to {target_lang}.",
            custom_instructions: "Keep it formal.",
            non_translatable_patterns: &[],
            tracked_changes: &tracked,
            full_source_context: &full_source,
            full_target_context: None,
            chunk_segments: &segments,
            figure_map: &figures,
            source_lang: "en",
            target_lang: "nl",
        };

        let content = ContextAssembler::build(&request);
        let ContentItem::Text(system) = &content[0] else { panic!("expected text") };
        assert_eq!(system, "Translate en to nl.");

        let ContentItem::Text(instructions) = &content[1] else { panic!("expected text") };
        assert_eq!(instructions, "Keep it formal.");

        let ContentItem::Text(tracked_block) = &content[2] else { panic!("expected text") };
        assert!(tracked_block.contains("Hello old world."));

        let ContentItem::Text(protocol) = &content[3] else { panic!("expected text") };
        assert!(protocol.contains("reference only"));

        let ContentItem::Text(source_block) = &content[4] else { panic!("expected text") };
        assert!(source_block.contains("1. First line."));
        assert!(source_block.contains("2. Second line."));

        let ContentItem::Text(numbered) = &content[5] else { panic!("expected text") };
        assert_eq!(numbered, "2. Second line.");

        let ContentItem::Text(last) = content.last().unwrap() else { panic!("expected text") };
        assert!(last.contains("numbered list"));
    }

    #[test]
    fn unrecognised_template_placeholder_falls_back_to_default() {
        let result = expand_system_prompt("Use {unknown_var} please", "en", "nl");
        assert!(result.contains("en"));
        assert!(result.contains("nl"));
        assert!(!result.contains("{unknown_var}"));
    }

    #[test]
    fn proofread_mode_emits_source_and_existing_translation_pair() {
        let figures = FigureImageMap::new();
        let full_source = vec![(1, "Hello.".to_string())];
        let full_target = vec![(1, "Hallo.".to_string())];
        let segments = vec![ChunkSegment { line_number: 1, source: "Hello.".to_string(), existing_target: Some("Hallo.".to_string()) }];

        let request = ChunkRequest {
            mode: RunMode::Proofread,
            system_prompt_template: DEFAULT_SYSTEM_PROMPT,
            custom_instructions: "",
            non_translatable_patterns: &[],
            tracked_changes: &[],
            full_source_context: &full_source,
            full_target_context: Some(&full_target),
            chunk_segments: &segments,
            figure_map: &figures,
            source_lang: "en",
            target_lang: "nl",
        };

        let content = ContextAssembler::build(&request);
        let texts: Vec<&str> = content
            .iter()
            .map(|c| match c {
                ContentItem::Text(t) => t.as_str(),
                ContentItem::Image { .. } => "<image>",
            })
            .collect();
        assert!(texts.iter().any(|t| t.contains("EXISTING TRANSLATION CONTEXT")));
        assert!(texts.iter().any(|t| *t == "1. SOURCE: Hello."));
        assert!(texts.iter().any(|t| *t == "1. EXISTING TRANSLATION: Hallo."));
        assert!(texts.last().unwrap().contains("CHANGES SUMMARY"));
    }

    #[test]
    fn truncation_marker_only_added_after_at_least_one_example() {
        let huge_pairs: Vec<TrackedChangePair> = (0..50)
            .map(|i| TrackedChangePair { original: format!("original text number {i} padded out"), r#final: format!("final text number {i} padded out") })
            .collect();
        let formatted = format_tracked_changes_context(&huge_pairs, 200);
        assert!(formatted.contains("truncated to save space"));
        assert!(formatted.contains("original text number 0"));
    }
}
