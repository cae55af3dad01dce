//! Notifications from the engine to the kiosk UI collaborator.

use bookdrop_core::{BinId, MaterialId, MaterialStatus, Tag};
use serde::Serialize;

use crate::material::Material;

/// Snapshot of one material for display purposes.
///
/// The UI never sees the [`Material`] itself; it gets an owned view it can
/// hold across engine updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialView {
    /// Backend item identifier.
    pub id: MaterialId,

    /// Lifecycle status at snapshot time.
    pub status: MaterialStatus,

    /// Tags seen so far, in detection order.
    pub tags: Vec<Tag>,

    /// Item title, once the backend supplied it.
    pub title: Option<String>,

    /// Item author, once the backend supplied it.
    pub author: Option<String>,

    /// User-facing message, set on failure.
    pub message: Option<String>,

    /// Backend sort code, once checked in.
    pub sort_bin: Option<String>,
}

impl From<&Material> for MaterialView {
    fn from(material: &Material) -> Self {
        Self {
            id: material.id().clone(),
            status: material.status(),
            tags: material.tags().to_vec(),
            title: material.title.clone(),
            author: material.author.clone(),
            message: material.message.clone(),
            sort_bin: material.sort_bin.clone(),
        }
    }
}

/// One event on the engine-to-UI channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiNotification {
    /// The reader connection is up; a scan has been requested.
    ReaderReady,

    /// A material changed status or content.
    MaterialUpdated(MaterialView),

    /// A material needs the patron to put a tag back on the device.
    AttentionRequired {
        /// The stuck material.
        material_id: MaterialId,
    },

    /// Every stuck material recovered; dismiss the prompt.
    AttentionCleared,

    /// A material completed and was routed to a destination.
    MaterialSorted {
        /// The finalized material.
        material_id: MaterialId,
        /// Destination it was routed to.
        bin: BinId,
    },

    /// A material failed with a user-facing reason.
    MaterialFailed {
        /// The failed material.
        material_id: MaterialId,
        /// Reason to show the patron.
        message: String,
    },

    /// The bridge dropped a frame or the reader reported a failure.
    BridgeIssue {
        /// Human-readable reason.
        reason: String,
    },
}
