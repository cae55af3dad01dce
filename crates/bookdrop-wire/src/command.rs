//! Outbound reader commands and frame encoding.

use bookdrop_core::TagUid;
use serde_json::{Value, json};

use crate::error::{Result, WireError};

/// One outbound command frame.
///
/// Commands are fire-and-forget: the reader answers a `DetectTags` with a
/// `tagsDetected` event and a `SetAfi` with a `setAFIResult` event, but no
/// command carries a correlation id — replies are matched by tag UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCommand {
    /// Ask the reader to report every tag currently in the field.
    DetectTags,

    /// Write the given AFI byte to one tag.
    SetAfi {
        /// Target tag.
        uid: TagUid,
        /// Sentinel byte to write (configured "on" or "off" value).
        afi: u8,
    },
}

impl ReaderCommand {
    /// Encode the command as a frame string.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            ReaderCommand::DetectTags => json!({ "event": "detectTags" }).to_string(),
            ReaderCommand::SetAfi { uid, afi } => json!({
                "event": "setAFI",
                "UID": uid.as_str(),
                "AFI": afi,
            })
            .to_string(),
        }
    }

    /// Decode a command frame back into its typed form.
    ///
    /// The kiosk never receives commands; this is for the transport glue and
    /// the mock reader, which observe the outbound side of the channel.
    ///
    /// # Errors
    /// Same taxonomy as event decoding: [`WireError::Parse`],
    /// [`WireError::MissingEvent`], [`WireError::UnknownEvent`].
    pub fn decode(frame: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| WireError::Parse(e.to_string()))?;

        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or(WireError::MissingEvent)?;

        match event {
            "detectTags" => Ok(ReaderCommand::DetectTags),
            "setAFI" => {
                let uid = value
                    .get("UID")
                    .and_then(Value::as_str)
                    .ok_or_else(|| WireError::Parse("setAFI frame without UID".into()))?;
                let uid = TagUid::new(uid).map_err(|e| WireError::Parse(e.to_string()))?;
                let afi = value
                    .get("AFI")
                    .and_then(Value::as_u64)
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| WireError::Parse("setAFI frame without AFI byte".into()))?;
                Ok(ReaderCommand::SetAfi { uid, afi })
            }
            other => Err(WireError::UnknownEvent(other.to_string())),
        }
    }
}
