//! Protocol and configuration constants.

/// Default AFI byte written to secure a tag ("security on").
///
/// ISO 15693 application family identifier used by library security gates.
/// Readers in the field expect this exact sentinel unless reconfigured.
pub const DEFAULT_AFI_ON: u8 = 194;

/// Default AFI byte written to release a tag ("security off").
pub const DEFAULT_AFI_OFF: u8 = 7;

/// Minimum accepted tag UID length in characters.
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum accepted tag UID length in characters.
pub const MAX_UID_LENGTH: usize = 32;

/// Maximum accepted material identifier length in characters.
pub const MAX_MATERIAL_ID_LENGTH: usize = 64;

/// Materials shown per page in a sorting destination listing.
pub const ITEMS_PER_PAGE: usize = 11;

/// Receipt group used when the backend reply carries no patron identifier.
pub const UNKNOWN_PATRON_GROUP: &str = "unknown";
