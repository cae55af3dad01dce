//! Bin sorter: routes finalized materials to physical destinations.

use std::collections::HashMap;

use bookdrop_core::{BinId, Error, MaterialId, Result, constants::ITEMS_PER_PAGE};
use serde::Serialize;
use tracing::debug;

/// Sorting configuration for one kiosk installation.
#[derive(Debug, Clone)]
pub struct BinSortingConfig {
    /// Physical destinations, in display order.
    pub destinations: Vec<BinId>,

    /// Backend sort code to destination.
    pub mapping: HashMap<String, BinId>,

    /// Destination for unmapped (or absent) sort codes.
    pub default_bin: BinId,

    /// Materials shown per page in a destination listing.
    pub items_per_page: usize,
}

impl BinSortingConfig {
    /// Single-destination setup; everything lands in `bin`.
    #[must_use]
    pub fn single(bin: BinId) -> Self {
        Self {
            destinations: vec![bin.clone()],
            mapping: HashMap::new(),
            default_bin: bin,
            items_per_page: ITEMS_PER_PAGE,
        }
    }

    /// Validate internal consistency.
    ///
    /// # Errors
    /// Returns `Error::Config` if there are no destinations, the default
    /// bin or a mapping target is not a declared destination, or the page
    /// size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(Error::Config("no sorting destinations declared".into()));
        }
        if !self.destinations.contains(&self.default_bin) {
            return Err(Error::Config(format!(
                "default bin {} is not a declared destination",
                self.default_bin
            )));
        }
        for (code, bin) in &self.mapping {
            if !self.destinations.contains(bin) {
                return Err(Error::Config(format!(
                    "sort code {code} maps to undeclared destination {bin}"
                )));
            }
        }
        if self.items_per_page == 0 {
            return Err(Error::Config("items per page must be at least 1".into()));
        }
        Ok(())
    }
}

/// Pagination state for one destination listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    /// Materials per page.
    pub items_per_page: usize,

    /// 1-based page currently shown; follows the newest append.
    pub current_page: usize,
}

/// One physical destination and the materials routed to it this session.
#[derive(Debug, Clone, Serialize)]
pub struct Bin {
    /// Destination id.
    pub id: BinId,

    /// Materials in arrival order; append-only during a session.
    pub materials: Vec<MaterialId>,

    /// Pagination state, recomputed on every append.
    pub pager: Pager,
}

impl Bin {
    fn new(id: BinId, items_per_page: usize) -> Self {
        Self {
            id,
            materials: Vec::new(),
            pager: Pager {
                items_per_page,
                current_page: 1,
            },
        }
    }

    /// Whether the material was already routed here.
    #[must_use]
    pub fn contains(&self, material: &MaterialId) -> bool {
        self.materials.contains(material)
    }

    /// Number of materials routed here.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether anything has been routed here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    fn append(&mut self, material: MaterialId) {
        if self.contains(&material) {
            return;
        }
        self.materials.push(material);
        self.pager.current_page = self.materials.len().div_ceil(self.pager.items_per_page);
    }
}

/// Maps finalized materials to destinations per the configured table.
#[derive(Debug)]
pub struct BinSorter {
    bins: Vec<Bin>,
    mapping: HashMap<String, BinId>,
    default_bin: BinId,
}

impl BinSorter {
    /// Build a sorter from a validated configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` when the configuration is inconsistent; see
    /// [`BinSortingConfig::validate`].
    pub fn new(config: BinSortingConfig) -> Result<Self> {
        config.validate()?;
        let bins = config
            .destinations
            .iter()
            .map(|id| Bin::new(id.clone(), config.items_per_page))
            .collect();
        Ok(Self {
            bins,
            mapping: config.mapping,
            default_bin: config.default_bin,
        })
    }

    /// Destination for a backend sort code. Unmapped and absent codes both
    /// resolve to the default destination.
    #[must_use]
    pub fn resolve(&self, sort_code: Option<&str>) -> &BinId {
        sort_code
            .and_then(|code| self.mapping.get(code))
            .unwrap_or(&self.default_bin)
    }

    /// Route a material by sort code. Idempotent: a material already in the
    /// destination is not appended twice. Returns the chosen destination.
    pub fn assign(&mut self, sort_code: Option<&str>, material: &MaterialId) -> BinId {
        let destination = self.resolve(sort_code).clone();
        debug!(%material, code = ?sort_code, bin = %destination, "routing material");

        if let Some(bin) = self.bins.iter_mut().find(|b| b.id == destination) {
            bin.append(material.clone());
        }
        destination
    }

    /// Destinations in display order.
    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Look up one destination.
    #[must_use]
    pub fn bin(&self, id: &BinId) -> Option<&Bin> {
        self.bins.iter().find(|b| &b.id == id)
    }

    /// Empty every destination; used at session teardown.
    pub fn clear(&mut self) {
        for bin in &mut self.bins {
            bin.materials.clear();
            bin.pager.current_page = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bin(s: &str) -> BinId {
        BinId::new(s).unwrap()
    }

    fn mid(s: &str) -> MaterialId {
        MaterialId::new(s).unwrap()
    }

    fn sorter() -> BinSorter {
        let mut mapping = HashMap::new();
        mapping.insert("1".to_string(), bin("fiction"));
        mapping.insert("2".to_string(), bin("children"));
        BinSorter::new(BinSortingConfig {
            destinations: vec![bin("fiction"), bin("children"), bin("other")],
            mapping,
            default_bin: bin("other"),
            items_per_page: 3,
        })
        .unwrap()
    }

    #[rstest]
    #[case(Some("1"), "fiction")]
    #[case(Some("2"), "children")]
    #[case(Some("3"), "other")] // unmapped code falls back
    #[case(None, "other")] // absent code falls back
    fn test_resolve(#[case] code: Option<&str>, #[case] expected: &str) {
        assert_eq!(sorter().resolve(code), &bin(expected));
    }

    #[test]
    fn test_assign_is_idempotent() {
        let mut sorter = sorter();
        sorter.assign(Some("1"), &mid("m1"));
        sorter.assign(Some("1"), &mid("m1"));

        assert_eq!(sorter.bin(&bin("fiction")).unwrap().len(), 1);
    }

    #[test]
    fn test_pager_follows_newest_append() {
        let mut sorter = sorter();
        for i in 0..4 {
            sorter.assign(Some("1"), &mid(&format!("m{i}")));
        }

        let fiction = sorter.bin(&bin("fiction")).unwrap();
        assert_eq!(fiction.len(), 4);
        // 4 materials at 3 per page: newest sits on page 2.
        assert_eq!(fiction.pager.current_page, 2);
    }

    #[test]
    fn test_config_validation() {
        let config = BinSortingConfig {
            destinations: vec![bin("a")],
            mapping: HashMap::new(),
            default_bin: bin("b"),
            items_per_page: 3,
        };
        assert!(config.validate().is_err());

        let mut mapping = HashMap::new();
        mapping.insert("1".to_string(), bin("nowhere"));
        let config = BinSortingConfig {
            destinations: vec![bin("a")],
            mapping,
            default_bin: bin("a"),
            items_per_page: 3,
        };
        assert!(config.validate().is_err());

        assert!(BinSortingConfig::single(bin("a")).validate().is_ok());
    }

    #[test]
    fn test_clear_resets_bins_and_pagers() {
        let mut sorter = sorter();
        for i in 0..5 {
            sorter.assign(Some("1"), &mid(&format!("m{i}")));
        }
        sorter.clear();

        let fiction = sorter.bin(&bin("fiction")).unwrap();
        assert!(fiction.is_empty());
        assert_eq!(fiction.pager.current_page, 1);
    }
}
