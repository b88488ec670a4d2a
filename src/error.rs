// ==============================================================================
// error.rs - ERRORS
// ------------------------------------------------------------------------------
// Error types for the wheel core.
//
// Not-ready conditions (no rigid body yet, wheels not instantiated) are not
// errors; `WheelController::tick` reports them through `TickOutcome`.
// ==============================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WheelError {
    /// A submodule was attached to a controller that does not exist.
    #[error("controller {controller} not found for submodule `{submodule}`")]
    ControllerNotFound {
        controller: usize,
        submodule: &'static str,
    },

    #[error("wheel index {index} out of range (part has {count} wheels)")]
    WheelIndexOutOfRange { index: usize, count: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("unknown wheel state tag `{0}`")]
    UnknownState(String),

    #[error("malformed persisted wheel data `{0}`")]
    MalformedPersistence(String),

    #[error("vessel `{0}` not found")]
    VesselNotFound(String),
}

/// Result type for wheel core operations
pub type Result<T> = std::result::Result<T, WheelError>;
