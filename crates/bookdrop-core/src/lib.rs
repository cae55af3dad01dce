//! Shared domain types for the Bookdrop return kiosk.
//!
//! This crate defines the vocabulary the other Bookdrop crates speak:
//! validated identifier newtypes ([`TagUid`], [`MaterialId`], [`BinId`]),
//! the per-tag state carried through a return session ([`Tag`]), the
//! material lifecycle ([`MaterialStatus`]), and the series metadata that
//! groups several physical tags into one logical material
//! ([`SeriesMembership`]).

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
