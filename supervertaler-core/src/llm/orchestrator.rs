//! Chunking, per-chunk LLM calls, numbered-response parsing and the
//! channel-based run model.
//!
//! The batch-then-call shape and line-count-mismatch handling are
//! grounded on `original_source/modules/ai_pretranslation_agent.py`'s
//! `pretranslate_segments`/`_translate_batch`; the channel/worker-thread
//! model is grounded on `tradocflow-core/src/services/document_processing.rs`'s
//! `ThreadSafeDocumentProcessor`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use regex::Regex;
use supervertaler_tm::NonTranslatablePattern;

use crate::config::RunMode;
use crate::context_assembler::{ChunkRequest, ChunkSegment, ContextAssembler};
use crate::figures::FigureImageMap;
use crate::llm::client::LLMClient;
use crate::tracked_changes::TrackedChangePair;

const MISSING_TRANSLATION_MARKER: &str = "[TL Missing line {}]";
const PROOFREAD_SKIPPED_NOTE: &str = "Segment not processed by AI Proofreader";
const MODEL_NOT_INIT_MARKER: &str = "[Err: Model not init]";
const NO_CHANGES_SENTINEL: &str = "no changes made to any segment in this batch";

/// Per-line result of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkLineResult {
    Translated(String),
    Proofread {
        original_target: String,
        revised_target: String,
        changes_summary: Option<String>,
        unchanged: bool,
    },
}

/// One message emitted on the run's channel, per spec §9's "three kinds
/// of messages" design note.
#[derive(Debug, Clone)]
pub enum RunMessage {
    Log(String),
    ChunkComplete(BTreeMap<u32, ChunkLineResult>),
    Done(RunOutcome),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Fail,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub total_lines: usize,
    pub placeholder_count: usize,
    pub modified_lines: usize,
}

/// Context shared by every chunk of one run.
pub struct RunContext {
    pub system_prompt_template: String,
    pub custom_instructions: String,
    pub non_translatable_patterns: Vec<NonTranslatablePattern>,
    pub full_source_context: Vec<(u32, String)>,
    pub full_target_context: Option<Vec<(u32, String)>>,
    pub figure_map: Arc<FigureImageMap>,
    pub source_lang: String,
    pub target_lang: String,
    pub tracked_change_cap: usize,
}

pub struct RunRequest {
    pub mode: RunMode,
    /// Segments needing an LLM call, ordered ascending by `line_number`
    /// (exact TM hits are supplied separately and never reach the LLM).
    pub segments: Vec<ChunkSegment>,
    pub chunk_size: usize,
    pub context: RunContext,
    pub tracked_changes: Arc<Vec<TrackedChangePair>>,
    /// Translate-mode exact TM hits, filled without calling the LLM.
    pub exact_tm_hits: BTreeMap<u32, String>,
}

/// A running (or finished) orchestration; drains `RunMessage`s as an
/// iterator and can be cancelled between chunks.
pub struct RunHandle {
    receiver: mpsc::Receiver<RunMessage>,
    cancel_flag: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn join(mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Iterator for RunHandle {
    type Item = RunMessage;

    fn next(&mut self) -> Option<RunMessage> {
        self.receiver.recv().ok()
    }
}

pub struct LLMOrchestrator {
    client: Arc<dyn LLMClient>,
}

impl LLMOrchestrator {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    /// Spawn the worker thread and return a handle to drain its messages.
    pub fn run(&self, request: RunRequest) -> RunHandle {
        let (sender, receiver) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel_flag);
        let client = Arc::clone(&self.client);

        let worker = std::thread::spawn(move || {
            run_worker(client, request, sender, worker_cancel);
        });

        RunHandle { receiver, cancel_flag, worker: Some(worker) }
    }
}

fn run_worker(
    client: Arc<dyn LLMClient>,
    request: RunRequest,
    sender: mpsc::Sender<RunMessage>,
    cancel_flag: Arc<AtomicBool>,
) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = sender.send(RunMessage::Log(format!("failed to start async runtime: {e}")));
            let _ = sender.send(RunMessage::Done(RunOutcome {
                status: RunStatus::Fail,
                total_lines: request.segments.len(),
                placeholder_count: request.segments.len(),
                modified_lines: 0,
            }));
            return;
        }
    };

    let mut placeholder_count = 0;
    let mut modified_lines = 0;
    let total_lines = request.exact_tm_hits.len() + request.segments.len();

    if !request.exact_tm_hits.is_empty() {
        let mut results = BTreeMap::new();
        for (&line, text) in &request.exact_tm_hits {
            results.insert(line, ChunkLineResult::Translated(text.clone()));
        }
        let _ = sender.send(RunMessage::Log(format!(
            "{} segment(s) filled from exact TM matches",
            request.exact_tm_hits.len()
        )));
        let _ = sender.send(RunMessage::ChunkComplete(results));
    }

    let chunk_size = request.chunk_size.max(1);
    let chunks: Vec<&[ChunkSegment]> = request.segments.chunks(chunk_size).collect();
    let mut fatal_model_error = false;

    for (chunk_index, chunk) in chunks.iter().enumerate() {
        if cancel_flag.load(Ordering::SeqCst) {
            let _ = sender.send(RunMessage::Cancelled);
            return;
        }

        let _ = sender.send(RunMessage::Log(format!(
            "processing chunk {}/{} ({} lines)",
            chunk_index + 1,
            chunks.len(),
            chunk.len()
        )));

        let line_numbers: Vec<u32> = chunk.iter().map(|s| s.line_number).collect();

        let results = if fatal_model_error {
            fill_placeholders(&request.mode, chunk, MODEL_NOT_INIT_MARKER)
        } else {
            let sources: Vec<&str> = chunk.iter().map(|s| s.source.as_str()).collect();
            let relevant = request.tracked_changes.as_ref();
            let relevant_pairs = relevant_tracked_changes(relevant, &sources, request.context.tracked_change_cap);

            let content_request = ChunkRequest {
                mode: request.mode,
                system_prompt_template: &request.context.system_prompt_template,
                custom_instructions: &request.context.custom_instructions,
                non_translatable_patterns: &request.context.non_translatable_patterns,
                tracked_changes: &relevant_pairs,
                full_source_context: &request.context.full_source_context,
                full_target_context: request.context.full_target_context.as_deref(),
                chunk_segments: chunk,
                figure_map: &request.context.figure_map,
                source_lang: &request.context.source_lang,
                target_lang: &request.context.target_lang,
            };
            let content = ContextAssembler::build(&content_request);

            match runtime.block_on(client.generate(&content)) {
                Ok(raw) => parse_chunk_response(&request.mode, chunk, &raw),
                Err(e) => {
                    let message = e.to_string();
                    let _ = sender.send(RunMessage::Log(format!("chunk {} failed: {message}", chunk_index + 1)));
                    if message.to_lowercase().contains("not init") {
                        fatal_model_error = true;
                        fill_placeholders(&request.mode, chunk, MODEL_NOT_INIT_MARKER)
                    } else {
                        let marker = format!("[TL Err line {{}}: {message}]");
                        fill_placeholders(&request.mode, chunk, &marker)
                    }
                }
            }
        };

        for line in &line_numbers {
            match results.get(line) {
                Some(ChunkLineResult::Translated(text)) if is_placeholder(text) => placeholder_count += 1,
                Some(ChunkLineResult::Proofread { unchanged, .. }) if !unchanged => modified_lines += 1,
                None => placeholder_count += 1,
                _ => {}
            }
        }

        let _ = sender.send(RunMessage::ChunkComplete(results));
    }

    let status = if placeholder_count == 0 {
        RunStatus::Success
    } else if placeholder_count < total_lines {
        RunStatus::PartialSuccess
    } else if total_lines == 0 {
        RunStatus::Success
    } else {
        RunStatus::PartialSuccess
    };

    let _ = sender.send(RunMessage::Done(RunOutcome { status, total_lines, placeholder_count, modified_lines }));
}

fn relevant_tracked_changes(pairs: &[TrackedChangePair], sources: &[&str], cap: usize) -> Vec<TrackedChangePair> {
    use crate::tracked_changes::TrackedChangeExtractor;
    TrackedChangeExtractor::from_pairs(pairs.to_vec()).relevant_for(sources, cap)
}

/// Whether `text` is one of the placeholder/error markers this module
/// emits for a missing or failed line; used by `ArtefactWriter` to skip
/// such rows on TMX export.
pub fn is_placeholder(text: &str) -> bool {
    text.starts_with("[TL Missing line") || text.starts_with("[TL Err line") || text.starts_with("[Err:")
}

fn fill_placeholders(mode: &RunMode, chunk: &[ChunkSegment], marker_template: &str) -> BTreeMap<u32, ChunkLineResult> {
    let mut out = BTreeMap::new();
    for segment in chunk {
        let marker = marker_template.replace("{}", &segment.line_number.to_string());
        match mode {
            RunMode::Translate => {
                out.insert(segment.line_number, ChunkLineResult::Translated(marker));
            }
            RunMode::Proofread => {
                out.insert(
                    segment.line_number,
                    ChunkLineResult::Proofread {
                        original_target: segment.existing_target.clone().unwrap_or_default(),
                        revised_target: marker,
                        changes_summary: None,
                        unchanged: false,
                    },
                );
            }
        }
    }
    out
}

fn numbered_line_regex() -> Regex {
    Regex::new(r"(?m)^\s*(\d+)[.)]\s*(.*)$").unwrap()
}

fn parse_numbered_lines(text: &str) -> BTreeMap<u32, String> {
    let re = numbered_line_regex();
    let mut map = BTreeMap::new();
    for cap in re.captures_iter(text) {
        if let Ok(n) = cap[1].parse::<u32>() {
            map.insert(n, cap[2].trim_end().to_string());
        }
    }
    map
}

/// Split off the `---CHANGES SUMMARY START--- ... ---CHANGES SUMMARY
/// END---` block, returning `(translations_text, summary_text)`.
fn split_changes_summary(text: &str) -> (&str, Option<&str>) {
    const START: &str = "---CHANGES SUMMARY START---";
    const END: &str = "---CHANGES SUMMARY END---";
    if let Some(start_idx) = text.find(START) {
        let after_start = &text[start_idx + START.len()..];
        if let Some(end_idx) = after_start.find(END) {
            return (&text[..start_idx], Some(&after_start[..end_idx]));
        }
    }
    (text, None)
}

fn parse_chunk_response(mode: &RunMode, chunk: &[ChunkSegment], raw: &str) -> BTreeMap<u32, ChunkLineResult> {
    match mode {
        RunMode::Translate => {
            let (translations_text, _) = split_changes_summary(raw);
            let parsed = parse_numbered_lines(translations_text);
            let mut out = BTreeMap::new();
            for segment in chunk {
                let value = parsed
                    .get(&segment.line_number)
                    .cloned()
                    .unwrap_or_else(|| format!("[TL Missing line {}]", segment.line_number));
                out.insert(segment.line_number, ChunkLineResult::Translated(value));
            }
            out
        }
        RunMode::Proofread => {
            let (translations_text, summary_text) = split_changes_summary(raw);
            let parsed = parse_numbered_lines(translations_text);
            let summary_lines = summary_text.map(parse_numbered_lines).unwrap_or_default();
            let no_changes = summary_text
                .map(|s| s.to_lowercase().contains(NO_CHANGES_SENTINEL))
                .unwrap_or(false);

            let mut out = BTreeMap::new();
            for segment in chunk {
                let original_target = segment.existing_target.clone().unwrap_or_default();
                let per_line_summary = summary_lines.get(&segment.line_number).cloned();

                let (revised_target, changes_summary) = match parsed.get(&segment.line_number) {
                    Some(text) => (text.clone(), per_line_summary),
                    None => (original_target.clone(), Some(PROOFREAD_SKIPPED_NOTE.to_string())),
                };

                let unchanged = revised_target.trim() == original_target.trim()
                    && (changes_summary.is_none() || no_changes || changes_summary.as_deref() == Some(""));

                out.insert(
                    segment.line_number,
                    ChunkLineResult::Proofread { original_target, revised_target, changes_summary, unchanged },
                );
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CoreResult;

    struct StaticClient {
        response: String,
    }

    #[async_trait::async_trait]
    impl LLMClient for StaticClient {
        async fn generate(&self, _content: &[crate::context_assembler::ContentItem]) -> CoreResult<String> {
            Ok(self.response.clone())
        }
    }

    fn context() -> RunContext {
        RunContext {
            system_prompt_template: "Translate {source_lang} to {target_lang}.".to_string(),
            custom_instructions: String::new(),
            non_translatable_patterns: Vec::new(),
            full_source_context: vec![(3, "Alpha source".to_string()), (4, "Beta source".to_string()), (5, "Gamma source".to_string())],
            full_target_context: None,
            figure_map: Arc::new(FigureImageMap::new()),
            source_lang: "en".to_string(),
            target_lang: "nl".to_string(),
            tracked_change_cap: 5,
        }
    }

    #[test]
    fn llm_response_parsing_scenario_fills_missing_line() {
        let chunk = vec![
            ChunkSegment { line_number: 3, source: "Alpha source".to_string(), existing_target: None },
            ChunkSegment { line_number: 4, source: "Beta source".to_string(), existing_target: None },
            ChunkSegment { line_number: 5, source: "Gamma source".to_string(), existing_target: None },
        ];
        let raw = "3. Alpha\n4) Beta\n";
        let results = parse_chunk_response(&RunMode::Translate, &chunk, raw);

        assert_eq!(results.get(&3), Some(&ChunkLineResult::Translated("Alpha".to_string())));
        assert_eq!(results.get(&4), Some(&ChunkLineResult::Translated("Beta".to_string())));
        assert_eq!(results.get(&5), Some(&ChunkLineResult::Translated("[TL Missing line 5]".to_string())));
    }

    #[test]
    fn single_segment_chunk_parses_single_line_output() {
        let chunk = vec![ChunkSegment { line_number: 1, source: "Hi".to_string(), existing_target: None }];
        let results = parse_chunk_response(&RunMode::Translate, &chunk, "1. Hoi");
        assert_eq!(results.get(&1), Some(&ChunkLineResult::Translated("Hoi".to_string())));
    }

    #[test]
    fn response_without_trailing_newline_still_parses() {
        let chunk = vec![ChunkSegment { line_number: 1, source: "Hi".to_string(), existing_target: None }];
        let results = parse_chunk_response(&RunMode::Translate, &chunk, "1. Hoi");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn extra_unnumbered_or_out_of_range_lines_are_ignored() {
        let chunk = vec![ChunkSegment { line_number: 2, source: "Hi".to_string(), existing_target: None }];
        let raw = "Some preamble text\n2. Hoi\n99. Irrelevant\n";
        let results = parse_chunk_response(&RunMode::Translate, &chunk, raw);
        assert_eq!(results.len(), 1);
        assert_eq!(results.get(&2), Some(&ChunkLineResult::Translated("Hoi".to_string())));
    }

    #[test]
    fn proofread_unchanged_line_is_classified_unchanged() {
        let chunk = vec![ChunkSegment { line_number: 1, source: "Hi".to_string(), existing_target: Some("Hoi".to_string()) }];
        let raw = "1. Hoi\n---CHANGES SUMMARY START---\nNo changes made to any segment in this batch.\n---CHANGES SUMMARY END---";
        let results = parse_chunk_response(&RunMode::Proofread, &chunk, raw);
        match results.get(&1).unwrap() {
            ChunkLineResult::Proofread { unchanged, .. } => assert!(*unchanged),
            _ => panic!("expected proofread result"),
        }
    }

    #[test]
    fn proofread_modified_line_increments_counter_via_run() {
        let client = Arc::new(StaticClient {
            response: "3. Alpha\n4. Beta revised\n5. Gamma\n---CHANGES SUMMARY START---\n4. tightened phrasing\n---CHANGES SUMMARY END---".to_string(),
        });
        let orchestrator = LLMOrchestrator::new(client);
        let segments = vec![
            ChunkSegment { line_number: 3, source: "Alpha source".to_string(), existing_target: Some("Alpha".to_string()) },
            ChunkSegment { line_number: 4, source: "Beta source".to_string(), existing_target: Some("Beta".to_string()) },
            ChunkSegment { line_number: 5, source: "Gamma source".to_string(), existing_target: Some("Gamma".to_string()) },
        ];
        let request = RunRequest {
            mode: RunMode::Proofread,
            segments,
            chunk_size: 10,
            context: context(),
            tracked_changes: Arc::new(Vec::new()),
            exact_tm_hits: BTreeMap::new(),
        };
        let handle = orchestrator.run(request);
        let messages: Vec<RunMessage> = handle.collect();
        let done = messages.iter().find_map(|m| match m {
            RunMessage::Done(outcome) => Some(outcome.clone()),
            _ => None,
        });
        assert_eq!(done.unwrap().modified_lines, 1);
    }

    #[test]
    fn exact_tm_hits_bypass_the_llm_and_are_reported_first() {
        let client = Arc::new(StaticClient { response: "3. Alpha\n".to_string() });
        let orchestrator = LLMOrchestrator::new(client);
        let mut exact = BTreeMap::new();
        exact.insert(1u32, "Hallo wereld".to_string());

        let request = RunRequest {
            mode: RunMode::Translate,
            segments: vec![ChunkSegment { line_number: 3, source: "Alpha source".to_string(), existing_target: None }],
            chunk_size: 10,
            context: context(),
            tracked_changes: Arc::new(Vec::new()),
            exact_tm_hits: exact,
        };
        let handle = orchestrator.run(request);
        let messages: Vec<RunMessage> = handle.collect();
        let first_chunk_complete = messages.iter().find_map(|m| match m {
            RunMessage::ChunkComplete(map) => Some(map.clone()),
            _ => None,
        });
        assert_eq!(
            first_chunk_complete.unwrap().get(&1),
            Some(&ChunkLineResult::Translated("Hallo wereld".to_string()))
        );
    }
}
