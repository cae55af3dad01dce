//! Inbound reader events and frame decoding.

use bookdrop_core::TagUid;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, WireError};

/// A tag as reported inside an inbound frame.
///
/// Readers report more fields than the engine consumes (signal strength,
/// memory banks); unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    /// Validated tag UID.
    pub uid: TagUid,
}

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Reader connection is up and ready for commands.
    Connected,

    /// Bulk scan result listing every tag currently in the field.
    TagsDetected(Vec<TagReport>),

    /// A single tag entered the field.
    TagDetected(TagReport),

    /// A tag left the field.
    TagRemoved(TagReport),

    /// Result of an earlier set-AFI command.
    AfiSetResult {
        /// Tag the command addressed.
        uid: TagUid,
        /// Raw AFI byte now on the tag.
        afi: u8,
        /// Whether the write took.
        success: bool,
    },
}

#[derive(Deserialize)]
struct RawTag {
    #[serde(alias = "UID")]
    uid: String,
}

#[derive(Deserialize)]
struct RawTags {
    tags: Vec<RawTag>,
}

#[derive(Deserialize)]
struct RawSingleTag {
    tag: RawTag,
}

#[derive(Deserialize)]
struct RawAfiResult {
    #[serde(rename = "UID")]
    uid: String,
    #[serde(rename = "AFI")]
    afi: u8,
    success: bool,
}

impl TryFrom<RawTag> for TagReport {
    type Error = WireError;

    fn try_from(raw: RawTag) -> Result<Self> {
        let uid = TagUid::new(&raw.uid).map_err(|e| WireError::Parse(e.to_string()))?;
        Ok(TagReport { uid })
    }
}

/// Decode a whole inbound frame into a [`ReaderEvent`].
///
/// # Errors
///
/// - [`WireError::Parse`] if the frame is not JSON or a known event's
///   payload does not decode,
/// - [`WireError::MissingEvent`] if the `event` field is absent or not a
///   string,
/// - [`WireError::UnknownEvent`] for a discriminator this protocol does not
///   know.
pub fn decode_event(frame: &str) -> Result<ReaderEvent> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| WireError::Parse(e.to_string()))?;

    let event = value
        .get("event")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingEvent)?;

    match event {
        "connected" => Ok(ReaderEvent::Connected),
        "tagsDetected" => {
            let raw: RawTags = decode_payload(value)?;
            let tags = raw
                .tags
                .into_iter()
                .map(TagReport::try_from)
                .collect::<Result<Vec<_>>>()?;
            Ok(ReaderEvent::TagsDetected(tags))
        }
        "tagDetected" => {
            let raw: RawSingleTag = decode_payload(value)?;
            Ok(ReaderEvent::TagDetected(raw.tag.try_into()?))
        }
        "tagRemoved" => {
            let raw: RawSingleTag = decode_payload(value)?;
            Ok(ReaderEvent::TagRemoved(raw.tag.try_into()?))
        }
        "setAFIResult" => {
            let raw: RawAfiResult = decode_payload(value)?;
            let uid = TagUid::new(&raw.uid).map_err(|e| WireError::Parse(e.to_string()))?;
            Ok(ReaderEvent::AfiSetResult {
                uid,
                afi: raw.afi,
                success: raw.success,
            })
        }
        other => Err(WireError::UnknownEvent(other.to_string())),
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| WireError::Parse(e.to_string()))
}
