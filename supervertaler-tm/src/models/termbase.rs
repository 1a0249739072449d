//! Termbase, Term, and activation/search result types.
//!
//! Grounded on `original_source/modules/termbase_manager.py` and the
//! `termbases`/`terms`/`termbase_project_activations` tables in
//! `original_source/modules/database_manager.py`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A container of terms, optionally scoped to one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Termbase {
    pub id: i64,
    pub name: String,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub project_id: Option<String>,
    pub description: String,
    /// `project_id.is_none()` implies `true`.
    pub is_global: bool,
    /// 1..99, lower is higher priority.
    pub priority: i32,
    /// At most one per project.
    pub is_project_termbase: bool,
    /// Assigned on activation, cleared on deactivation; `None` when inactive
    /// or when this is a project termbase (those never receive a ranking).
    pub ranking: Option<i32>,
}

/// Termbase plus an aggregated term count, as returned by listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermbaseSummary {
    pub termbase: Termbase,
    pub term_count: i64,
}

/// One entry in a termbase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub termbase_id: i64,
    pub source_term: String,
    pub target_term: String,
    /// 1..99, lower is higher priority.
    pub priority: i32,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub domain: Option<String>,
    pub notes: String,
    pub project: Option<String>,
    pub client: Option<String>,
    pub forbidden: bool,
    /// Stable across import/export, independent of the row's local `id`.
    pub term_uuid: Uuid,
}

impl Term {
    pub fn new_uuid() -> Uuid {
        Uuid::new_v4()
    }
}

/// `(termbase_id, project_id)` activation state. A missing row defaults to
/// active; this struct only ever represents a row that was explicitly
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermbaseActivation {
    pub termbase_id: i64,
    pub project_id: String,
    pub is_active: bool,
    pub activated_date: chrono::DateTime<chrono::Utc>,
}

/// One result of a termbase search against a source fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermHit {
    pub term: Term,
    pub termbase_name: String,
    pub termbase_ranking: Option<i32>,
}
