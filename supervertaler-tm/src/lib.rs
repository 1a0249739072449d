//! Translation memory, termbase and TMX storage for Supervertaler.
//!
//! Owns all `Segment`, `TranslationUnit`, `Termbase` and `Term` state on
//! behalf of `supervertaler-core`. All SQLite access is synchronous and
//! serialised behind a single mutex-guarded connection per store, per the
//! concurrency model described for the wider system.

pub mod error;
pub mod models;
pub mod segment_store;
pub mod similarity;
pub mod termbase_store;
pub mod tm_store;
pub mod tmx_codec;

pub use error::{ErrorCategory, Result, TmError};
pub use models::{
    MatchScore, NonTranslatablePattern, Project, Segment, SegmentStatus, TableInfo, Term, Termbase,
    TermbaseActivation, TermbaseSummary, TermHit, TranslationMatch, TranslationUnit,
};
pub use segment_store::{FilterCriteria, FilterHit, FilterView, SegmentStore};
pub use termbase_store::TermbaseStore;
pub use tm_store::TmStore;
pub use tmx_codec::{TmxDbStore, TmxPair};
