//! Series metadata lookup.
//!
//! Which material a tag belongs to, and how many tags that material has in
//! total, is catalog data owned by the circulation backend. The engine
//! receives it through the [`SeriesDirectory`] seam and never tries to
//! reconstruct it from tag contents.

use std::collections::HashMap;

use bookdrop_core::{MaterialId, SeriesMembership, TagUid};

/// Pure lookup from tag UID to series metadata.
pub trait SeriesDirectory: Send + Sync {
    /// Resolve the owning material and expected tag count for `uid`.
    ///
    /// Must be total: a tag the catalog does not know is its own single-tag
    /// material.
    fn membership(&self, uid: &TagUid) -> SeriesMembership;
}

/// Table-backed directory, loaded from the backend's sort/series feed.
///
/// Unlisted tags fall back to a single-tag material keyed by the UID.
#[derive(Debug, Clone, Default)]
pub struct TableSeriesDirectory {
    entries: HashMap<TagUid, SeriesMembership>,
}

impl TableSeriesDirectory {
    /// Create an empty directory (every tag resolves to a single-tag
    /// material).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one tag's membership.
    pub fn insert(&mut self, uid: TagUid, membership: SeriesMembership) {
        self.entries.insert(uid, membership);
    }

    /// Register a complete series: every UID in `uids` belongs to
    /// `material_id` and the expected count is the series size.
    pub fn insert_series(&mut self, material_id: MaterialId, uids: Vec<TagUid>) {
        let expected = uids.len();
        for uid in uids {
            self.entries.insert(
                uid,
                SeriesMembership {
                    material_id: material_id.clone(),
                    expected_tags: expected,
                },
            );
        }
    }

    /// Number of registered tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SeriesDirectory for TableSeriesDirectory {
    fn membership(&self, uid: &TagUid) -> SeriesMembership {
        self.entries
            .get(uid)
            .cloned()
            .unwrap_or_else(|| SeriesMembership::single(MaterialId::from(uid.clone())))
    }
}
