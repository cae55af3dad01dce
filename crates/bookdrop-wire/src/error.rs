//! Error taxonomy for malformed reader frames.

/// Result type alias for wire decoding.
pub type Result<T> = std::result::Result<T, WireError>;

/// A frame that could not be decoded into a [`ReaderEvent`](crate::ReaderEvent).
///
/// The display strings are part of the contract with the error channel the
/// UI listens on; they must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The frame is not valid JSON, or a recognized event carried a payload
    /// that does not decode (wrong shape, invalid tag UID).
    #[error("JSON parse error: {0}")]
    Parse(String),

    /// The frame has no `event` discriminator field.
    #[error("event field missing")]
    MissingEvent,

    /// The `event` discriminator is not one this protocol knows.
    #[error("event not recognized")]
    UnknownEvent(String),
}
