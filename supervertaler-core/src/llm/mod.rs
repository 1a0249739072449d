pub mod client;
pub mod orchestrator;
pub mod providers;

pub use client::LLMClient;
pub use orchestrator::{
    is_placeholder, ChunkLineResult, LLMOrchestrator, RunContext, RunHandle, RunMessage, RunOutcome, RunRequest, RunStatus,
};
pub use providers::{build_client, ClaudeClient, GeminiClient, OpenAiClient};
