//! CLI entry point: wires DOCX/TXT ingestion, segmentation, TM/termbase/
//! tracked-change/figure context, LLM orchestration and artefact
//! reconstruction into one end-to-end batch run.
//!
//! Grounded on `tradocflow-core/src/main.rs`'s `env_logger::init()` +
//! `tokio::runtime::Runtime` bootstrap shape and
//! `tradocflow-translation-memory/src/bin/rest_server.rs`'s CLI-driven
//! service wiring, generalised from a GUI bootstrap / HTTP server into a
//! one-shot batch pipeline over spec §6's external interfaces.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use supervertaler_core::{
    ApiKeyConfig, ArtefactWriter, DocxCodec, FigureImageMap, LLMOrchestrator, ProofreadRow,
    ProviderHint, RunConfig, RunContext, RunMessage, RunMode, RunOutcome, RunReport, RunRequest,
    RunStatus, Segmenter, SegmenterMode, TrackedChangeExtractor, TranslateRow, build_client,
};
use supervertaler_core::context_assembler::{ChunkSegment, DEFAULT_SYSTEM_PROMPT};
use supervertaler_tm::{Segment, SegmentStatus, SegmentStore, TermbaseStore, TmStore};

#[derive(Parser)]
#[command(
    name = "supervertaler",
    version,
    about = "DOCX/TXT ingestion, TM- and termbase-assisted LLM translation and proofreading, TMX/DOCX reconstruction."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a translate or proofread pass over a DOCX or TXT source.
    Run(RunArgs),
    /// Translation-memory maintenance against a SQLite-backed TM store.
    Tm {
        #[command(subcommand)]
        action: TmAction,
    },
    /// Termbase maintenance against a SQLite-backed termbase store.
    Termbase {
        #[command(subcommand)]
        action: TermbaseAction,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the source document: `.docx`, or `.txt`/`.tsv` for
    /// tab-delimited bilingual input.
    #[arg(long)]
    input: PathBuf,

    /// `translate` or `proofread`.
    #[arg(long, default_value = "translate")]
    mode: String,

    #[arg(long)]
    source_lang: String,

    #[arg(long)]
    target_lang: String,

    /// `gemini`, `claude`, or `openai`.
    #[arg(long)]
    provider: String,

    #[arg(long)]
    model: String,

    /// Directory artefacts are written into; created if missing.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Defaults to the provider's own default chunk size (see
    /// `ProviderHint::default_chunk_size`).
    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    custom_instructions_file: Option<PathBuf>,

    #[arg(long)]
    system_prompt_file: Option<PathBuf>,

    #[arg(long, default_value = "api_keys.txt")]
    api_keys_file: PathBuf,

    /// SQLite TM file; opened in-memory (no persistence) when omitted.
    #[arg(long)]
    tm_db: Option<PathBuf>,

    /// Restrict TM lookups to these `tm_id`s; searches all when empty.
    #[arg(long = "tm-id")]
    tm_ids: Vec<String>,

    #[arg(long, default_value_t = true)]
    bidirectional_tm: bool,

    /// SQLite termbase file; opened in-memory (no persistence) when omitted.
    #[arg(long)]
    termbase_db: Option<PathBuf>,

    #[arg(long)]
    termbase_project_id: Option<String>,

    /// Directory of figure images keyed by normalised filename stem.
    #[arg(long)]
    figures_dir: Option<PathBuf>,

    /// `.docx` files to mine tracked-change pairs from.
    #[arg(long = "tracked-change-docx")]
    tracked_change_docx: Vec<PathBuf>,

    /// `original<TAB>final` TSV files to ingest as tracked-change pairs.
    #[arg(long = "tracked-change-tsv")]
    tracked_change_tsv: Vec<PathBuf>,

    #[arg(long)]
    tracked_change_count: Option<usize>,

    /// Use the markdown-aware segmenter (protects code spans, links, etc.).
    #[arg(long)]
    markdown_segmentation: bool,

    #[arg(long, default_value_t = 0.6)]
    fuzzy_threshold: f64,

    #[arg(long, default_value_t = 5)]
    max_tm_matches: usize,
}

#[derive(Subcommand)]
enum TmAction {
    Add {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        tm_id: String,
        #[arg(long)]
        source_lang: String,
        #[arg(long)]
        target_lang: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
    },
    ImportTmx {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        tm_id: String,
        #[arg(long)]
        tmx_file: PathBuf,
        #[arg(long)]
        source_lang: String,
        #[arg(long)]
        target_lang: String,
    },
    ExportTmx {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        tm_id: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        source_lang: String,
        #[arg(long)]
        target_lang: String,
    },
    Concordance {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum TermbaseAction {
    Create {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        source_lang: Option<String>,
        #[arg(long)]
        target_lang: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long, default_value_t = false)]
        project_termbase: bool,
    },
    AddTerm {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        termbase_id: i64,
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = 99)]
        priority: i32,
        #[arg(long, default_value_t = false)]
        forbidden: bool,
    },
    Activate {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        termbase_id: i64,
        #[arg(long)]
        project_id: String,
    },
    Deactivate {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        termbase_id: i64,
        #[arg(long)]
        project_id: String,
    },
    List {
        #[arg(long)]
        db: PathBuf,
    },
    Search {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long)]
        source_lang: Option<String>,
        #[arg(long)]
        target_lang: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run_pipeline(args),
        Command::Tm { action } => run_tm_action(action).map(|()| ExitCode::SUCCESS),
        Command::Termbase { action } => run_termbase_action(action).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            log::error!("{message}");
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
    }
}

fn parse_provider(s: &str) -> Result<ProviderHint, String> {
    match s.to_lowercase().as_str() {
        "gemini" | "google" => Ok(ProviderHint::Gemini),
        "claude" | "anthropic" => Ok(ProviderHint::Claude),
        "openai" | "chatgpt" => Ok(ProviderHint::OpenAi),
        other => Err(format!("unknown provider {other:?}; expected gemini, claude, or openai")),
    }
}

fn parse_mode(s: &str) -> Result<RunMode, String> {
    match s.to_lowercase().as_str() {
        "translate" => Ok(RunMode::Translate),
        "proofread" => Ok(RunMode::Proofread),
        other => Err(format!("unknown mode {other:?}; expected translate or proofread")),
    }
}

/// One paragraph's worth of sentence segments, retained so the export
/// step can rejoin them back into their originating paragraph.
struct ParagraphGroup {
    paragraph_id: usize,
    segment_ids: Vec<u32>,
}

fn run_pipeline(args: RunArgs) -> Result<ExitCode, String> {
    let mode = parse_mode(&args.mode)?;
    let provider = parse_provider(&args.provider)?;

    let keys = ApiKeyConfig::load_or_create(&args.api_keys_file).map_err(|e| e.to_string())?;
    let client = build_client(&keys, provider, &args.model).map_err(|e| e.to_string())?;

    std::fs::create_dir_all(&args.output_dir).map_err(|e| e.to_string())?;

    let segmenter_mode = if args.markdown_segmentation { SegmenterMode::MarkdownAware } else { SegmenterMode::Plain };
    let segmenter = Segmenter::new(segmenter_mode);

    let is_docx = args.input.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("docx")).unwrap_or(false);

    let mut store = SegmentStore::new();
    let mut paragraph_groups: Vec<ParagraphGroup> = Vec::new();
    let mut original_comments: BTreeMap<u32, String> = BTreeMap::new();

    if is_docx {
        if mode == RunMode::Proofread {
            return Err("proofread mode expects a bilingual TXT input (source<TAB>target); DOCX proofreading is not wired up in this CLI".to_string());
        }
        ingest_docx(&args.input, &segmenter, &mut store, &mut paragraph_groups)?;
    } else {
        let contents = std::fs::read_to_string(&args.input).map_err(|e| e.to_string())?;
        match mode {
            RunMode::Translate => ingest_translate_txt(&contents, &mut store),
            RunMode::Proofread => ingest_proofread_txt(&contents, &mut store, &mut original_comments),
        }
    }

    if store.is_empty() {
        log::warn!("no data: input produced zero segments");
        let outcome = RunOutcome { status: RunStatus::Success, total_lines: 0, placeholder_count: 0, modified_lines: 0 };
        write_report(&args, mode, provider, &outcome, DEFAULT_SYSTEM_PROMPT, "")?;
        return Ok(ExitCode::SUCCESS);
    }

    let system_prompt = match &args.system_prompt_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| e.to_string())?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };
    let custom_instructions = match &args.custom_instructions_file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| e.to_string())?,
        None => String::new(),
    };

    let figure_map = Arc::new(match &args.figures_dir {
        Some(dir) => FigureImageMap::load_dir(dir).map_err(|e| e.to_string())?,
        None => FigureImageMap::new(),
    });

    let mut tracked = TrackedChangeExtractor::new();
    for path in &args.tracked_change_docx {
        let added = tracked.load_docx(path).map_err(|e| e.to_string())?;
        log::info!("mined {added} tracked-change pair(s) from {}", path.display());
    }
    for path in &args.tracked_change_tsv {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let added = tracked.load_tsv(&contents);
        log::info!("loaded {added} tracked-change pair(s) from {}", path.display());
    }
    let tracked_changes = Arc::new(tracked.pairs().to_vec());

    let tm_store = match &args.tm_db {
        Some(path) => Some(TmStore::open_file(path).map_err(|e| e.to_string())?),
        None => None,
    };

    let full_source_context: Vec<(u32, String)> = store.all_source_texts();

    let chunk_size = args.chunk_size.unwrap_or_else(|| provider.default_chunk_size());

    let mut run_config = RunConfig::new(&args.source_lang, &args.target_lang, mode, provider);
    run_config.chunk_size = chunk_size;
    run_config.custom_instructions = custom_instructions.clone();
    run_config.tm_ids = args.tm_ids.clone();
    run_config.termbase_project_id = args.termbase_project_id.clone();
    run_config.bidirectional_tm = args.bidirectional_tm;
    run_config.fuzzy_threshold = args.fuzzy_threshold;
    run_config.max_tm_matches = args.max_tm_matches;
    run_config.tracked_change_count = args.tracked_change_count.unwrap_or(run_config.tracked_change_count);

    let mut exact_tm_hits: BTreeMap<u32, String> = BTreeMap::new();
    let mut llm_segments: Vec<ChunkSegment> = Vec::new();
    let tm_id_filter = if run_config.tm_ids.is_empty() { None } else { Some(run_config.tm_ids.as_slice()) };

    for segment in store.all() {
        let existing_target = if mode == RunMode::Proofread { Some(segment.target.clone()) } else { None };

        if mode == RunMode::Translate {
            if let Some(tm) = &tm_store {
                let hit = tm
                    .exact_match(&segment.source, tm_id_filter, Some(&args.source_lang), Some(&args.target_lang), run_config.bidirectional_tm)
                    .map_err(|e| e.to_string())?;
                if let Some(hit) = hit {
                    let text = if hit.reverse_match { hit.unit.source_text.clone() } else { hit.unit.target_text.clone() };
                    exact_tm_hits.insert(segment.id, text);
                    continue;
                }
            }
        }

        llm_segments.push(ChunkSegment { line_number: segment.id, source: segment.source.clone(), existing_target });
    }

    let run_context = RunContext {
        system_prompt_template: system_prompt.clone(),
        custom_instructions: custom_instructions.clone(),
        non_translatable_patterns: Vec::new(),
        full_source_context: full_source_context.clone(),
        full_target_context: if mode == RunMode::Proofread {
            Some(store.all().map(|s| (s.id, s.target.clone())).collect())
        } else {
            None
        },
        figure_map: Arc::clone(&figure_map),
        source_lang: args.source_lang.clone(),
        target_lang: args.target_lang.clone(),
        tracked_change_cap: run_config.tracked_change_count,
    };

    let request = RunRequest {
        mode,
        segments: llm_segments,
        chunk_size: run_config.chunk_size,
        context: run_context,
        tracked_changes,
        exact_tm_hits,
    };

    let orchestrator = LLMOrchestrator::new(client);
    let handle = orchestrator.run(request);

    let mut proofread_results: BTreeMap<u32, (String, String, Option<String>)> = BTreeMap::new();
    let mut outcome: Option<RunOutcome> = None;

    for message in handle {
        match message {
            RunMessage::Log(line) => log::info!("{line}"),
            RunMessage::ChunkComplete(results) => apply_chunk_results(mode, &mut store, &mut proofread_results, results),
            RunMessage::Done(final_outcome) => outcome = Some(final_outcome),
            RunMessage::Cancelled => log::warn!("run cancelled"),
        }
    }

    let outcome = outcome.ok_or_else(|| "orchestrator exited without a final status".to_string())?;

    let stem = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string();

    match mode {
        RunMode::Translate => {
            let rows: Vec<TranslateRow> =
                store.all().map(|s| TranslateRow { source: s.source.clone(), target: s.target.clone() }).collect();
            let txt_path = args.output_dir.join(format!("{stem}.txt"));
            ArtefactWriter::write_translate_txt(&txt_path, &rows).map_err(|e| e.to_string())?;

            let tmx_path = args.output_dir.join(format!("{stem}.tmx"));
            ArtefactWriter::write_tmx(&tmx_path, &rows, &args.source_lang, &args.target_lang).map_err(|e| e.to_string())?;

            if is_docx {
                let docx_out = args.output_dir.join(format!("{stem}.docx"));
                let records: Vec<(usize, String)> = paragraph_groups
                    .iter()
                    .map(|group| {
                        let text = group
                            .segment_ids
                            .iter()
                            .filter_map(|id| store.get(*id))
                            .map(|s| s.target.as_str())
                            .collect::<Vec<_>>()
                            .join(" ");
                        (group.paragraph_id, text)
                    })
                    .collect();
                DocxCodec::export(&args.input, &docx_out, &records).map_err(|e| e.to_string())?;
            }
        }
        RunMode::Proofread => {
            let rows: Vec<ProofreadRow> = store
                .all()
                .map(|s| {
                    let (original_target, revised_target, changes_summary) = proofread_results
                        .get(&s.id)
                        .cloned()
                        .unwrap_or_else(|| (s.target.clone(), s.target.clone(), None));
                    ProofreadRow {
                        source: s.source.clone(),
                        original_target,
                        revised_target,
                        original_comment: original_comments.get(&s.id).cloned(),
                        changes_summary,
                    }
                })
                .collect();
            let txt_path = args.output_dir.join(format!("{stem}.txt"));
            ArtefactWriter::write_proofread_txt(&txt_path, &rows).map_err(|e| e.to_string())?;
        }
    }

    write_report(&args, mode, provider, &outcome, &system_prompt, &custom_instructions)?;

    Ok(match outcome.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::PartialSuccess => ExitCode::from(1),
        RunStatus::Fail => ExitCode::from(2),
    })
}

fn apply_chunk_results(
    mode: RunMode,
    store: &mut SegmentStore,
    proofread_results: &mut BTreeMap<u32, (String, String, Option<String>)>,
    results: BTreeMap<u32, supervertaler_core::ChunkLineResult>,
) {
    for (id, result) in results {
        match (mode, result) {
            (RunMode::Translate, supervertaler_core::ChunkLineResult::Translated(text)) => {
                if let Err(e) = store.update_target(id, text) {
                    log::warn!("segment {id}: {e}");
                }
            }
            (RunMode::Proofread, supervertaler_core::ChunkLineResult::Proofread { original_target, revised_target, changes_summary, .. }) => {
                proofread_results.insert(id, (original_target, revised_target, changes_summary));
            }
            _ => {}
        }
    }
}

fn ingest_docx(
    path: &Path,
    segmenter: &Segmenter,
    store: &mut SegmentStore,
    paragraph_groups: &mut Vec<ParagraphGroup>,
) -> Result<(), String> {
    let paragraphs = DocxCodec::import(path).map_err(|e| e.to_string())?;
    let mut next_id = 1u32;

    for info in &paragraphs {
        let sentences = segmenter.segment_text(&info.text);
        if sentences.is_empty() {
            paragraph_groups.push(ParagraphGroup { paragraph_id: info.paragraph_id, segment_ids: Vec::new() });
            continue;
        }

        let mut group = ParagraphGroup { paragraph_id: info.paragraph_id, segment_ids: Vec::new() };
        for sentence in sentences {
            let mut segment = Segment::new(next_id, sentence, info.paragraph_id, info.document_position).with_style(info.style.clone());
            if let Some(table_info) = info.table_info {
                segment = segment.with_table_info(table_info);
            }
            group.segment_ids.push(next_id);
            store.add_segment(segment);
            next_id += 1;
        }
        paragraph_groups.push(group);
    }
    Ok(())
}

/// Per spec §6's "Input TXT (Translate)" contract: one non-empty line per
/// segment; extra tab-separated columns are noted, not dropped silently.
fn ingest_translate_txt(contents: &str, store: &mut SegmentStore) {
    let mut next_id = 1u32;
    for (idx, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut columns = line.split('\t');
        let source = columns.next().unwrap_or("").to_string();
        if source.is_empty() {
            continue;
        }
        if columns.next().is_some() {
            log::info!("line {}: extra tab-separated columns ignored", idx + 1);
        }
        store.add_segment(Segment::new(next_id, source, idx, idx as u64));
        next_id += 1;
    }
}

/// Per spec §6's "Input TXT (Proofread)" contract: `source<TAB>target[<TAB>comment]`;
/// lines with fewer than two columns are skipped with a warning.
fn ingest_proofread_txt(contents: &str, store: &mut SegmentStore, original_comments: &mut BTreeMap<u32, String>) {
    let mut next_id = 1u32;
    for (idx, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 2 {
            log::warn!("line {}: expected source<TAB>target, skipping", idx + 1);
            continue;
        }
        let mut segment = Segment::new(next_id, columns[0].to_string(), idx, idx as u64);
        segment.target = columns[1].to_string();
        if !segment.target.is_empty() {
            segment.status = SegmentStatus::Draft;
        }
        if let Some(comment) = columns.get(2) {
            if !comment.is_empty() {
                original_comments.insert(next_id, comment.to_string());
            }
        }
        store.add_segment(segment);
        next_id += 1;
    }
}

fn write_report(
    args: &RunArgs,
    mode: RunMode,
    provider: ProviderHint,
    outcome: &RunOutcome,
    system_prompt_sent: &str,
    custom_instructions: &str,
) -> Result<(), String> {
    let stem = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string();
    let report = RunReport {
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        mode,
        provider,
        model: &args.model,
        source_path: &args.input.display().to_string(),
        output_dir: &args.output_dir.display().to_string(),
        source_lang: &args.source_lang,
        target_lang: &args.target_lang,
        chunk_size: args.chunk_size.unwrap_or_else(|| provider.default_chunk_size()),
        tm_ids: &args.tm_ids,
        figures_dir: args.figures_dir.as_ref().map(|p| p.to_str().unwrap_or_default()),
        tracked_change_sources: &args
            .tracked_change_docx
            .iter()
            .chain(args.tracked_change_tsv.iter())
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
        system_prompt_sent,
        custom_instructions,
        outcome,
    };
    let report_path = args.output_dir.join(format!("{stem}_report.md"));
    report.write(&report_path).map_err(|e| e.to_string())
}

fn run_tm_action(action: TmAction) -> Result<(), String> {
    match action {
        TmAction::Add { db, tm_id, source_lang, target_lang, source, target } => {
            let store = TmStore::open_file(&db).map_err(|e| e.to_string())?;
            let id = store.add_unit(&source, &target, &source_lang, &target_lang, &tm_id, None, None, None).map_err(|e| e.to_string())?;
            println!("added translation unit {id}");
        }
        TmAction::ImportTmx { db, tm_id, tmx_file, source_lang, target_lang } => {
            let store = TmStore::open_file(&db).map_err(|e| e.to_string())?;
            let contents = std::fs::read_to_string(&tmx_file).map_err(|e| e.to_string())?;
            let pairs = supervertaler_tm::tmx_codec::read_tmx(&contents, &source_lang, &target_lang).map_err(|e| e.to_string())?;
            for pair in &pairs {
                store.add_unit(&pair.source, &pair.target, &source_lang, &target_lang, &tm_id, None, None, None).map_err(|e| e.to_string())?;
            }
            println!("imported {} translation unit(s) into tm_id={tm_id}", pairs.len());
        }
        TmAction::ExportTmx { db, tm_id, out, source_lang, target_lang } => {
            let store = TmStore::open_file(&db).map_err(|e| e.to_string())?;
            let matches = store.concordance_search("", 1_000_000).map_err(|e| e.to_string())?;
            let pairs: Vec<supervertaler_tm::tmx_codec::TmxPair> = matches
                .into_iter()
                .filter(|u| u.tm_id == tm_id)
                .map(|u| supervertaler_tm::tmx_codec::TmxPair { source: u.source_text, target: u.target_text })
                .collect();
            let xml = supervertaler_tm::tmx_codec::write_tmx(&pairs, &source_lang, &target_lang).map_err(|e| e.to_string())?;
            std::fs::write(&out, xml).map_err(|e| e.to_string())?;
            println!("exported {} pair(s) to {}", pairs.len(), out.display());
        }
        TmAction::Concordance { db, text, limit } => {
            let store = TmStore::open_file(&db).map_err(|e| e.to_string())?;
            let hits = store.concordance_search(&text, limit).map_err(|e| e.to_string())?;
            for hit in hits {
                println!("{}\t{}", hit.source_text, hit.target_text);
            }
        }
    }
    Ok(())
}

fn run_termbase_action(action: TermbaseAction) -> Result<(), String> {
    match action {
        TermbaseAction::Create { db, name, source_lang, target_lang, project_id, project_termbase } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            let is_global = project_id.is_none();
            let id = store
                .create_termbase(&name, source_lang.as_deref(), target_lang.as_deref(), project_id.as_deref(), "", is_global, project_termbase)
                .map_err(|e| e.to_string())?;
            println!("created termbase {id}");
        }
        TermbaseAction::AddTerm { db, termbase_id, source, target, priority, forbidden } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            let id = store
                .add_term(termbase_id, &source, &target, priority, None, "", None, None, forbidden, None, None, None)
                .map_err(|e| e.to_string())?;
            println!("added term {id}");
        }
        TermbaseAction::Activate { db, termbase_id, project_id } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            store.activate(termbase_id, &project_id).map_err(|e| e.to_string())?;
            println!("activated termbase {termbase_id} for project {project_id}");
        }
        TermbaseAction::Deactivate { db, termbase_id, project_id } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            store.deactivate(termbase_id, &project_id).map_err(|e| e.to_string())?;
            println!("deactivated termbase {termbase_id} for project {project_id}");
        }
        TermbaseAction::List { db } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            for summary in store.list_termbases().map_err(|e| e.to_string())? {
                println!(
                    "{}\t{}\tranking={:?}\tterms={}",
                    summary.termbase.id, summary.termbase.name, summary.termbase.ranking, summary.term_count
                );
            }
        }
        TermbaseAction::Search { db, query, source_lang, target_lang, project_id } => {
            let store = TermbaseStore::open_file(&db).map_err(|e| e.to_string())?;
            let hits = store
                .search_terms(&query, source_lang.as_deref(), target_lang.as_deref(), project_id.as_deref(), None)
                .map_err(|e| e.to_string())?;
            for hit in hits {
                let forbidden = if hit.term.forbidden { " [FORBIDDEN]" } else { "" };
                println!("{}\t{} -> {}{forbidden}", hit.termbase_name, hit.term.source_term, hit.term.target_term);
            }
        }
    }
    Ok(())
}
