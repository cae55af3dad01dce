use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier validation
    #[error("Invalid tag UID: {0}")]
    InvalidTagUid(String),

    #[error("Invalid material id: {0}")]
    InvalidMaterialId(String),

    #[error("Invalid bin id: {0}")]
    InvalidBinId(String),

    #[error("Invalid series metadata: {0}")]
    InvalidSeries(String),

    // Lifecycle errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
