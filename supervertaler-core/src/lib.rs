//! DOCX ingestion, segmentation, tracked-change mining, LLM orchestration
//! and output-artefact reconstruction for Supervertaler.
//!
//! Persistent knowledge (segments, translation memory, termbases, TMX) is
//! owned by [`supervertaler_tm`]; this crate is the pipeline that feeds
//! and drives it.

pub mod artefact;
pub mod config;
pub mod context_assembler;
pub mod docx;
pub mod error;
pub mod figures;
pub mod llm;
pub mod segmenter;
pub mod tracked_changes;

pub use artefact::{ArtefactWriter, ProofreadRow, RunReport, TranslateRow};
pub use config::{ApiKeyConfig, ProjectFile, ProviderHint, RunConfig, RunMode};
pub use context_assembler::{ChunkRequest, ChunkSegment, ContentItem, ContextAssembler};
pub use docx::{DocxCodec, DocxParagraphInfo, RunInfo};
pub use error::{CoreError, Result};
pub use figures::{find_all_figure_references, find_figure_reference, FigureImageMap};
pub use llm::{
    build_client, is_placeholder, ChunkLineResult, ClaudeClient, GeminiClient, LLMClient, LLMOrchestrator, OpenAiClient, RunContext,
    RunHandle, RunMessage, RunOutcome, RunRequest, RunStatus,
};
pub use segmenter::{Segmenter, SegmenterMode};
pub use tracked_changes::{TrackedChangeExtractor, TrackedChangePair};
