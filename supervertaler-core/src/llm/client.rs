//! The `LLMClient` capability boundary.
//!
//! Per spec §9's "dynamic dispatch across providers" design note: one
//! `generate` method replaces a per-provider class hierarchy, with
//! `ProviderHint` (see [`crate::config::ProviderHint`]) the only
//! provider-identity signal the orchestrator consults.

use async_trait::async_trait;

use crate::context_assembler::ContentItem;
use crate::error::Result;

/// External LLM boundary. Implementations own provider idiosyncrasies
/// (token parameters, reasoning-effort knobs, minimum output budgets);
/// the orchestrator only ever calls `generate`.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(&self, content: &[ContentItem]) -> Result<String>;
}
