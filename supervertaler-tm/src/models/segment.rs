//! The `Segment` entity and its status lattice.
//!
//! Grounded on `original_source/modules/segment_manager.py`'s `Segment`
//! class for the field set and `to_dict`/`from_dict` round-trip contract.
//! That source does not enforce monotonic status transitions; the lattice
//! enforcement here is new logic layered on top, built directly from spec
//! §4.D rather than ported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Segment`].
///
/// Ordered: `untranslated < draft < translated < approved`. Only explicit
/// operator action may transition a segment beyond `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Untranslated,
    Draft,
    Translated,
    Approved,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untranslated => "untranslated",
            Self::Draft => "draft",
            Self::Translated => "translated",
            Self::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "untranslated" => Some(Self::Untranslated),
            "draft" => Some(Self::Draft),
            "translated" => Some(Self::Translated),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// `(table_index, row_index, cell_index)` position of a table-cell segment.
pub type TableInfo = (usize, usize, usize);

/// One translatable unit, typically a sentence.
///
/// Invariant: `status == Untranslated` implies `target` is empty. Setting
/// `target` to non-empty text promotes `Untranslated` to `Draft` and never
/// regresses a higher status; see [`crate::segment_store::SegmentStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    pub source: String,
    pub target: String,
    pub status: SegmentStatus,
    pub paragraph_id: usize,
    pub document_position: u64,
    pub style: String,
    pub is_table_cell: bool,
    pub table_info: Option<TableInfo>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub modified: bool,
}

impl Segment {
    /// Create a fresh, untranslated segment at ingestion time.
    pub fn new(id: u32, source: impl Into<String>, paragraph_id: usize, document_position: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            source: source.into(),
            target: String::new(),
            status: SegmentStatus::Untranslated,
            paragraph_id,
            document_position,
            style: "Normal".to_string(),
            is_table_cell: false,
            table_info: None,
            notes: String::new(),
            created_at: now,
            modified_at: now,
            modified: false,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_table_info(mut self, table_info: TableInfo) -> Self {
        self.is_table_cell = true;
        self.table_info = Some(table_info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lattice_orders_correctly() {
        assert!(SegmentStatus::Untranslated < SegmentStatus::Draft);
        assert!(SegmentStatus::Draft < SegmentStatus::Translated);
        assert!(SegmentStatus::Translated < SegmentStatus::Approved);
    }

    #[test]
    fn new_segment_is_untranslated_with_empty_target() {
        let seg = Segment::new(1, "Hello world", 0, 0);
        assert_eq!(seg.status, SegmentStatus::Untranslated);
        assert!(seg.target.is_empty());
        assert!(!seg.modified);
    }
}
