//! Device Event Bridge: the single owner of the reader connection.
//!
//! Everything between the raw frame channel and the return engine goes
//! through this crate. The bridge decodes inbound frames into
//! [`BridgeEvent`]s, translates the configured AFI sentinel bytes to and
//! from booleans, and exposes the two fire-and-forget commands the engine
//! needs: [`ReaderBridge::request_scan`] and [`ReaderBridge::set_afi`].
//!
//! # Architecture
//!
//! ```text
//! transport glue ──frames──► ┌──────────────┐
//!  (or MockReader)           │ ReaderBridge │──BridgeEvent──► return engine
//!                ◄─commands──└──────────────┘
//! ```
//!
//! Exactly one reader connection is live at a time. [`ReaderBridge::accept`]
//! binds a new connection and silently drops the stale one, so a reconnecting
//! reader never double-delivers events.
//!
//! # Failure posture
//!
//! A frame that does not decode becomes [`BridgeEvent::Error`] carrying the
//! wire error text; the bridge itself keeps running. Command sends onto a
//! dead connection are logged and dropped — the reader will be asked to
//! rescan when it comes back anyway.

pub mod bridge;
pub mod error;
pub mod mock;

pub use bridge::{AfiProfile, BridgeConfig, BridgeEvent, ReaderBridge, ReaderLink};
pub use error::{BridgeError, Result};
pub use mock::MockReader;
