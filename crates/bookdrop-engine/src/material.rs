//! Material state as tracked through a return session.

use bookdrop_core::{Error, MaterialId, MaterialStatus, Result, Tag, TagUid};

use crate::backend::CheckInResponse;

/// How a detection event relates to what the material already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagArrival {
    /// First time this tag was seen.
    New,

    /// The tag was marked removed and is back on the device.
    Reappeared,

    /// Duplicate detection of a tag already present.
    AlreadyPresent,
}

/// One logical material being returned.
///
/// Tags are only ever added, never dropped: a removed tag stays in the list
/// with its `removed` flag set, which is what lets the engine answer "was
/// this series ever complete" after the fact.
#[derive(Debug, Clone)]
pub struct Material {
    pub(crate) id: MaterialId,
    pub(crate) status: MaterialStatus,
    pub(crate) tags: Vec<Tag>,
    pub(crate) expected_tags: usize,
    pub(crate) loading: bool,
    pub(crate) sort_bin: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) snapshot: Option<CheckInResponse>,
}

impl Material {
    /// Create a material in `Collecting` with no tags seen yet.
    #[must_use]
    pub fn new(id: MaterialId, expected_tags: usize) -> Self {
        Self {
            id,
            status: MaterialStatus::Collecting,
            tags: Vec::with_capacity(expected_tags),
            expected_tags,
            loading: false,
            sort_bin: None,
            message: None,
            title: None,
            author: None,
            snapshot: None,
        }
    }

    /// Backend item identifier.
    #[must_use]
    pub fn id(&self) -> &MaterialId {
        &self.id
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> MaterialStatus {
        self.status
    }

    /// Tags seen so far, in detection order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Number of tags the complete series carries.
    #[must_use]
    pub fn expected_tags(&self) -> usize {
        self.expected_tags
    }

    /// A check-in request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Sort code from the backend reply, once checked in.
    #[must_use]
    pub fn sort_bin(&self) -> Option<&str> {
        self.sort_bin.as_deref()
    }

    /// User-facing message, set on failure.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Raw backend reply, kept for receipt rendering.
    #[must_use]
    pub fn snapshot(&self) -> Option<&CheckInResponse> {
        self.snapshot.as_ref()
    }

    /// Record a detection event for `uid`.
    pub fn observe_tag(&mut self, uid: &TagUid) -> TagArrival {
        if let Some(tag) = self.tags.iter_mut().find(|t| &t.uid == uid) {
            if tag.removed {
                tag.removed = false;
                TagArrival::Reappeared
            } else {
                TagArrival::AlreadyPresent
            }
        } else {
            self.tags.push(Tag::detected(uid.clone()));
            TagArrival::New
        }
    }

    /// Mark `uid` as off the device. Returns `false` if the tag was never
    /// seen on this material.
    pub fn mark_removed(&mut self, uid: &TagUid) -> bool {
        match self.tags.iter_mut().find(|t| &t.uid == uid) {
            Some(tag) => {
                tag.removed = true;
                true
            }
            None => false,
        }
    }

    /// Record the reader's confirmation that `uid` now carries the secure
    /// AFI. Returns `false` if the tag was never seen on this material.
    pub fn confirm_afi(&mut self, uid: &TagUid) -> bool {
        match self.tags.iter_mut().find(|t| &t.uid == uid) {
            Some(tag) => {
                tag.afi_on = true;
                true
            }
            None => false,
        }
    }

    /// Completeness predicate: every expected tag detected and none of the
    /// detected tags currently removed.
    #[must_use]
    pub fn series_complete(&self) -> bool {
        self.tags.len() >= self.expected_tags && !self.any_tag_removed()
    }

    /// At least one detected tag is currently off the device.
    #[must_use]
    pub fn any_tag_removed(&self) -> bool {
        self.tags.iter().any(|t| t.removed)
    }

    /// Every detected tag has its AFI confirmed on.
    #[must_use]
    pub fn all_afi_on(&self) -> bool {
        !self.tags.is_empty() && self.tags.iter().all(|t| t.afi_on)
    }

    /// Move to `target`, validating against the lifecycle rules.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateTransition` if the lifecycle does not
    /// allow the move.
    pub fn set_status(&mut self, target: MaterialStatus) -> Result<()> {
        if !self.status.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }
}
