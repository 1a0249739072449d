//! In-memory ordered store of a document's segments and their status
//! lattice transitions.
//!
//! Field set and `to_dict`/`from_dict` round-trip are grounded on
//! `original_source/modules/segment_manager.py`'s `Segment` class. That
//! source mutates `status` directly with no ordering guarantee; the
//! monotonic lattice enforced by `update_target`/`set_status` here is new
//! logic built from spec §4.D.

use std::collections::BTreeMap;

use crate::error::{Result, TmError};
use crate::models::segment::{Segment, SegmentStatus};

/// Criteria for [`SegmentStore::query`]: `source_substring`/`target_substring`
/// match case-insensitively; an absent field matches everything.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub source_substring: Option<String>,
    pub target_substring: Option<String>,
    pub status: Option<SegmentStatus>,
}

impl FilterCriteria {
    fn matches(&self, segment: &Segment) -> bool {
        if let Some(needle) = &self.source_substring {
            if !segment.source.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(needle) = &self.target_substring {
            if !segment.target.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if segment.status != status {
                return false;
            }
        }
        true
    }
}

/// Whether a non-matching segment is dropped (`Filter`) or kept and
/// flagged (`Highlight`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterView {
    Filter,
    Highlight,
}

/// One row of a [`SegmentStore::query`] result.
#[derive(Debug)]
pub struct FilterHit<'a> {
    pub segment: &'a Segment,
    pub matched: bool,
}

/// Owns all segments for one document, keyed by id, in document order.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: BTreeMap<u32, Segment>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.insert(segment.id, segment);
    }

    pub fn get(&self, id: u32) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Segment> {
        self.segments.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments in ascending id (hence document) order.
    pub fn all(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn all_source_texts(&self) -> Vec<(u32, String)> {
        self.segments.values().map(|s| (s.id, s.source.clone())).collect()
    }

    pub fn filter_by_status(&self, status: SegmentStatus) -> Vec<&Segment> {
        self.segments.values().filter(|s| s.status == status).collect()
    }

    /// Apply a filter/highlight query over all segments, in
    /// `document_position` order. `Filter` hides non-matches; `Highlight`
    /// keeps every segment but flags which ones matched. Both are pure
    /// views: neither mutates the store.
    pub fn query(&self, criteria: &FilterCriteria, view: FilterView) -> Vec<FilterHit<'_>> {
        let mut ordered: Vec<&Segment> = self.segments.values().collect();
        ordered.sort_by_key(|s| s.document_position);

        ordered
            .into_iter()
            .filter_map(|segment| {
                let matched = criteria.matches(segment);
                match view {
                    FilterView::Filter if !matched => None,
                    _ => Some(FilterHit { segment, matched }),
                }
            })
            .collect()
    }

    /// Set `target` text. Promotes `Untranslated` to `Draft` on first
    /// non-empty write; never regresses a higher status. Writing an empty
    /// string while status is above `Untranslated` is rejected — use
    /// `clear` for that.
    pub fn update_target(&mut self, id: u32, target: impl Into<String>) -> Result<()> {
        let target = target.into();
        let seg = self
            .segments
            .get_mut(&id)
            .ok_or_else(|| TmError::NotFound(format!("segment {id}")))?;

        if target.is_empty() && seg.status != SegmentStatus::Untranslated {
            return Err(TmError::InvalidInput(format!(
                "segment {id}: cannot set empty target while status is {:?}; use clear()",
                seg.status
            )));
        }

        seg.target = target;
        if !seg.target.is_empty() && seg.status == SegmentStatus::Untranslated {
            seg.status = SegmentStatus::Draft;
        }
        seg.modified = true;
        seg.modified_at = chrono::Utc::now();
        Ok(())
    }

    /// Explicitly set status. Rejects any transition that would regress the
    /// lattice, except the single allowed reset: `Untranslated` is only
    /// reachable from any state when `target` is already empty.
    pub fn set_status(&mut self, id: u32, status: SegmentStatus) -> Result<()> {
        let seg = self
            .segments
            .get_mut(&id)
            .ok_or_else(|| TmError::NotFound(format!("segment {id}")))?;

        if status == SegmentStatus::Untranslated && !seg.target.is_empty() {
            return Err(TmError::InvalidInput(format!(
                "segment {id}: cannot reset to untranslated while target is non-empty"
            )));
        }
        if status < seg.status && status != SegmentStatus::Untranslated {
            return Err(TmError::InvalidInput(format!(
                "segment {id}: cannot regress status from {:?} to {status:?}",
                seg.status
            )));
        }

        seg.status = status;
        seg.modified = true;
        seg.modified_at = chrono::Utc::now();
        Ok(())
    }

    /// Reset a segment to `Untranslated` with an empty target, regardless
    /// of current status.
    pub fn clear(&mut self, id: u32) -> Result<()> {
        let seg = self
            .segments
            .get_mut(&id)
            .ok_or_else(|| TmError::NotFound(format!("segment {id}")))?;
        seg.target.clear();
        seg.status = SegmentStatus::Untranslated;
        seg.modified = true;
        seg.modified_at = chrono::Utc::now();
        Ok(())
    }

    /// Apply a batch of `(id, target)` results, e.g. from an LLM run.
    /// Each id is applied independently: a missing id is recorded and the
    /// rest of the batch still proceeds, per spec §4.D. Segments whose ids
    /// are not present in `results` at all are left untouched.
    pub fn apply_translations(
        &mut self,
        results: impl IntoIterator<Item = (u32, String)>,
    ) -> (std::collections::BTreeSet<u32>, std::collections::BTreeSet<u32>) {
        let mut ok = std::collections::BTreeSet::new();
        let mut missing = std::collections::BTreeSet::new();
        for (id, target) in results {
            match self.update_target(id, target) {
                Ok(()) => {
                    ok.insert(id);
                }
                Err(_) => {
                    missing.insert(id);
                }
            }
        }
        (ok, missing)
    }

    pub fn to_dict_list(&self) -> Vec<serde_json::Value> {
        self.segments
            .values()
            .map(|s| serde_json::to_value(s).expect("Segment serializes"))
            .collect()
    }

    pub fn from_dict_list(values: &[serde_json::Value]) -> Result<Self> {
        let mut store = Self::new();
        for value in values {
            let segment: Segment = serde_json::from_value(value.clone())?;
            store.add_segment(segment);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> SegmentStore {
        let mut store = SegmentStore::new();
        store.add_segment(Segment::new(1, "Hello", 0, 0));
        store.add_segment(Segment::new(2, "World", 1, 1));
        store
    }

    #[test]
    fn update_target_promotes_untranslated_to_draft() {
        let mut store = sample_store();
        store.update_target(1, "Bonjour").unwrap();
        let seg = store.get(1).unwrap();
        assert_eq!(seg.status, SegmentStatus::Draft);
        assert_eq!(seg.target, "Bonjour");
    }

    #[test]
    fn status_never_regresses_except_explicit_clear() {
        let mut store = sample_store();
        store.update_target(1, "Bonjour").unwrap();
        store.set_status(1, SegmentStatus::Approved).unwrap();
        assert!(store.set_status(1, SegmentStatus::Draft).is_err());
        store.clear(1).unwrap();
        assert_eq!(store.get(1).unwrap().status, SegmentStatus::Untranslated);
    }

    #[test]
    fn apply_translations_leaves_untouched_segments_byte_identical() {
        let mut store = sample_store();
        let before = store.get(2).unwrap().clone();
        let (ok, missing) = store.apply_translations(vec![(1, "Bonjour".to_string())]);
        assert_eq!(ok, std::collections::BTreeSet::from([1]));
        assert!(missing.is_empty());
        assert_eq!(store.get(2).unwrap().target, before.target);
        assert_eq!(store.get(2).unwrap().status, before.status);
    }

    #[test]
    fn apply_translations_records_missing_ids_without_aborting() {
        let mut store = sample_store();
        let (ok, missing) = store.apply_translations(vec![
            (1, "Bonjour".to_string()),
            (99, "Nonexistent".to_string()),
            (2, "Monde".to_string()),
        ]);
        assert_eq!(ok, std::collections::BTreeSet::from([1, 2]));
        assert_eq!(missing, std::collections::BTreeSet::from([99]));
        assert_eq!(store.get(1).unwrap().target, "Bonjour");
        assert_eq!(store.get(2).unwrap().target, "Monde");
    }

    #[test]
    fn filter_view_hides_non_matches_highlight_view_keeps_all() {
        let mut store = sample_store();
        store.update_target(1, "Bonjour").unwrap();
        let criteria = FilterCriteria { source_substring: Some("hello".to_string()), ..Default::default() };

        let filtered = store.query(&criteria, FilterView::Filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].segment.id, 1);

        let highlighted = store.query(&criteria, FilterView::Highlight);
        assert_eq!(highlighted.len(), 2);
        assert!(highlighted.iter().find(|h| h.segment.id == 1).unwrap().matched);
        assert!(!highlighted.iter().find(|h| h.segment.id == 2).unwrap().matched);
    }

    #[test]
    fn dict_round_trip_preserves_all_fields() {
        let store = sample_store();
        let dicts = store.to_dict_list();
        let restored = SegmentStore::from_dict_list(&dicts).unwrap();
        assert_eq!(restored.get(1).unwrap(), store.get(1).unwrap());
        assert_eq!(restored.get(2).unwrap(), store.get(2).unwrap());
    }
}
