use crate::{
    Result,
    constants::{MAX_MATERIAL_ID_LENGTH, MAX_UID_LENGTH, MIN_UID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// RFID tag UID as reported by the reader.
///
/// UIDs are normalized (trimmed and uppercased) before validation so that the
/// same physical tag always maps to the same key, regardless of how a given
/// reader firmware cases its hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagUid(String);

impl TagUid {
    /// Create a tag UID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagUid` if the UID is outside the accepted
    /// length range (4-32 characters) or contains non-alphanumeric input.
    pub fn new(uid: &str) -> Result<Self> {
        let uid = uid.trim().to_uppercase();

        let len = uid.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&len) {
            return Err(Error::InvalidTagUid(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} chars, got {len}"
            )));
        }

        if !uid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidTagUid(format!(
                "UID must be ASCII alphanumeric: {uid}"
            )));
        }

        Ok(TagUid(uid))
    }

    /// Get the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagUid::new(s)
    }
}

/// Backend item identifier for one logical material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(String);

impl MaterialId {
    /// Create a material id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidMaterialId` if the id is empty after trimming
    /// or longer than 64 characters.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim().to_string();

        if id.is_empty() {
            return Err(Error::InvalidMaterialId("id must not be empty".into()));
        }
        if id.len() > MAX_MATERIAL_ID_LENGTH {
            return Err(Error::InvalidMaterialId(format!(
                "id must be at most {MAX_MATERIAL_ID_LENGTH} chars, got {}",
                id.len()
            )));
        }

        Ok(MaterialId(id))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MaterialId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MaterialId::new(s)
    }
}

/// A single-tag material with no catalog entry is keyed by its only tag's
/// UID. Every valid UID is a valid material id, so this cannot fail.
impl From<TagUid> for MaterialId {
    fn from(uid: TagUid) -> Self {
        MaterialId(uid.0)
    }
}

/// Identifier of a physical sorting destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinId(String);

impl BinId {
    /// Create a bin id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidBinId` if the id is empty after trimming.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidBinId("id must not be empty".into()));
        }
        Ok(BinId(id))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BinId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BinId::new(s)
    }
}

/// One physical tag as tracked through a return session.
///
/// A tag is created on first detection and kept for the lifetime of its
/// material, even after it leaves the reader field; `removed` records the
/// current physical presence without erasing the detection history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag UID (identity).
    pub uid: TagUid,

    /// Tag is currently out of the reader field.
    pub removed: bool,

    /// AFI confirmed on by the reader.
    pub afi_on: bool,
}

impl Tag {
    /// Create a freshly detected tag: present, security not yet set.
    #[must_use]
    pub fn detected(uid: TagUid) -> Self {
        Self {
            uid,
            removed: false,
            afi_on: false,
        }
    }

    /// Tag is physically on the device.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.removed
    }
}

/// Material lifecycle status.
///
/// ```text
/// Collecting ──> CheckingIn ──> AwaitingAfi ──> Sorted
///                    │
///                    └────────> Error
/// ```
///
/// `Sorted` and `Error` are terminal. Removal of a tag never changes the
/// status by itself: while `Collecting` the check-in attempt is simply not
/// taken, and while `AwaitingAfi` the material is parked in the attention
/// set until the tag reappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    /// Tags of the series are still being gathered on the device.
    Collecting,

    /// Check-in request sent to the circulation backend, reply pending.
    CheckingIn,

    /// Backend accepted the return; waiting for every tag's AFI confirmation.
    AwaitingAfi,

    /// All AFIs confirmed on; material routed to its sorting destination.
    Sorted,

    /// Backend rejected the return or replied malformed.
    Error,
}

impl MaterialStatus {
    /// Check if transition to `target` is valid from this status.
    #[must_use]
    pub fn can_transition_to(&self, target: &MaterialStatus) -> bool {
        matches!(
            (self, target),
            (MaterialStatus::Collecting, MaterialStatus::CheckingIn)
                | (
                    MaterialStatus::CheckingIn,
                    MaterialStatus::AwaitingAfi | MaterialStatus::Error
                )
                | (MaterialStatus::AwaitingAfi, MaterialStatus::Sorted)
        )
    }

    /// Terminal statuses end the material's participation in the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MaterialStatus::Sorted | MaterialStatus::Error)
    }
}

impl fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            MaterialStatus::Collecting => "Collecting",
            MaterialStatus::CheckingIn => "CheckingIn",
            MaterialStatus::AwaitingAfi => "AwaitingAfi",
            MaterialStatus::Sorted => "Sorted",
            MaterialStatus::Error => "Error",
        };
        write!(f, "{}", status)
    }
}

/// Series metadata for one tag: which material it belongs to and how many
/// tags the full series has (e.g. 3 for a three-disc audiobook).
///
/// Supplied by the circulation backend's item catalog; the engine never
/// infers it from tag contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMembership {
    /// Owning material.
    pub material_id: MaterialId,

    /// Number of tags the complete series carries.
    pub expected_tags: usize,
}

impl SeriesMembership {
    /// Create series metadata with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSeries` if `expected_tags` is zero.
    pub fn new(material_id: MaterialId, expected_tags: usize) -> Result<Self> {
        if expected_tags == 0 {
            return Err(Error::InvalidSeries(
                "series must expect at least one tag".into(),
            ));
        }
        Ok(Self {
            material_id,
            expected_tags,
        })
    }

    /// Single-tag series for `material_id`.
    #[must_use]
    pub fn single(material_id: MaterialId) -> Self {
        Self {
            material_id,
            expected_tags: 1,
        }
    }
}
