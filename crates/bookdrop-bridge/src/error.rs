//! Error types for bridge operations.

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by the bridge and its mock reader.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The other half of the reader channel is gone.
    #[error("Reader channel closed: {0}")]
    ChannelClosed(String),
}

impl BridgeError {
    /// Create a new channel-closed error.
    pub fn channel_closed(context: impl Into<String>) -> Self {
        Self::ChannelClosed(context.into())
    }
}
