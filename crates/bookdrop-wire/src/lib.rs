//! Wire protocol for the RFID reader channel.
//!
//! The reader and the kiosk exchange single JSON objects over a message
//! channel. This crate defines the typed form of those messages and the
//! encode/decode functions between them and raw frame text. Transport
//! framing (how frames travel over TCP or a WebSocket) is someone else's
//! problem; this crate starts where a whole frame string is available.
//!
//! # Inbound frames (reader to kiosk)
//!
//! | event          | payload                  | meaning                      |
//! |----------------|--------------------------|------------------------------|
//! | `connected`    | —                        | reader ready                 |
//! | `tagsDetected` | `tags: []`               | bulk scan result             |
//! | `tagDetected`  | `tag`                    | single tag entered the field |
//! | `tagRemoved`   | `tag`                    | tag left the field           |
//! | `setAFIResult` | `UID`, `AFI`, `success`  | result of a set-AFI command  |
//!
//! # Outbound frames (kiosk to reader)
//!
//! `{"event":"detectTags"}` and `{"event":"setAFI","UID":…,"AFI":…}` where
//! `AFI` is one of the two configured sentinel bytes.
//!
//! # Malformed frames
//!
//! Decoding never panics. A bad frame maps to exactly one of three
//! [`WireError`] cases — unparseable JSON, missing `event` discriminator, or
//! an unrecognized discriminator — so the bridge can report it and move on.

pub mod command;
pub mod error;
pub mod event;

pub use command::ReaderCommand;
pub use error::{Result, WireError};
pub use event::{ReaderEvent, TagReport, decode_event};
