//! Material correlator: groups physical tags into logical materials.

use std::collections::HashMap;

use bookdrop_core::{MaterialId, TagUid};
use tracing::debug;

use crate::material::{Material, TagArrival};
use crate::series::SeriesDirectory;

/// Result of feeding one detection event through the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Material the tag belongs to.
    pub material_id: MaterialId,

    /// How the event relates to the material's existing tag list.
    pub arrival: TagArrival,
}

/// Groups tags into materials and tracks the one-active-material-per-tag
/// invariant through an ownership index.
#[derive(Debug)]
pub struct MaterialCorrelator<D> {
    directory: D,
    materials: HashMap<MaterialId, Material>,
    owners: HashMap<TagUid, MaterialId>,
}

impl<D: SeriesDirectory> MaterialCorrelator<D> {
    /// Create a correlator over the given series directory.
    #[must_use]
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            materials: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Record a detection event, creating the owning material on first
    /// contact with its series.
    pub fn observe(&mut self, uid: TagUid) -> Observation {
        if let Some(material_id) = self.owners.get(&uid).cloned()
            && let Some(material) = self.materials.get_mut(&material_id)
        {
            let arrival = material.observe_tag(&uid);
            return Observation {
                material_id,
                arrival,
            };
        }

        let membership = self.directory.membership(&uid);
        let material = self
            .materials
            .entry(membership.material_id.clone())
            .or_insert_with(|| {
                debug!(material_id = %membership.material_id, expected = membership.expected_tags,
                    "starting material");
                Material::new(membership.material_id.clone(), membership.expected_tags)
            });
        let arrival = material.observe_tag(&uid);
        self.owners.insert(uid, membership.material_id.clone());

        Observation {
            material_id: membership.material_id,
            arrival,
        }
    }

    /// Mark a tag removed on its owning material; `None` when the tag is
    /// unknown (never detected this session, or its material already
    /// retired).
    pub fn mark_removed(&mut self, uid: &TagUid) -> Option<MaterialId> {
        let material_id = self.owners.get(uid)?.clone();
        let material = self.materials.get_mut(&material_id)?;
        material.mark_removed(uid);
        Some(material_id)
    }

    /// Material currently owning `uid`, if any.
    #[must_use]
    pub fn owner_of(&self, uid: &TagUid) -> Option<&MaterialId> {
        self.owners.get(uid)
    }

    /// Look up a material by id.
    #[must_use]
    pub fn material(&self, id: &MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Mutable lookup by id.
    pub fn material_mut(&mut self, id: &MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    /// Drop a finalized material from the working set, releasing its tags
    /// for a future (fresh) return attempt.
    pub fn retire(&mut self, id: &MaterialId) -> Option<Material> {
        let material = self.materials.remove(id)?;
        self.owners.retain(|_, owner| owner != id);
        debug!(material_id = %id, status = %material.status(), "retired material");
        Some(material)
    }

    /// Discard everything; used at session teardown.
    pub fn clear(&mut self) {
        self.materials.clear();
        self.owners.clear();
    }

    /// Number of active materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the working set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
