use crate::DetectSource;
use thiserror::Error;

/// Startup configuration problems. These are fatal: no capture can run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no cameras configured")]
    NoCameras,
    #[error("no chain groups configured")]
    NoChains,
    #[error("{0} must not be empty")]
    EmptyId(&'static str),
    #[error("camera {0} configured twice")]
    DuplicateCamera(String),
    #[error("chain {0} configured twice")]
    DuplicateChain(String),
    #[error("no joint names configured for chain {chain_id}")]
    NoJointNames { chain_id: String },
    #[error("joint {joint} listed twice for chain {chain_id}")]
    DuplicateJoint { chain_id: String, joint: String },
    #[error("joint {joint} of chain {chain_id} missing from an accepted joint state")]
    MissingJoint { chain_id: String, joint: String },
    #[error("invalid pattern size {cols}x{rows}")]
    InvalidPattern { cols: u32, rows: u32 },
    #[error("target chain {0} is not a configured chain group")]
    UnknownTargetChain(String),
}

/// A joint-state broadcast could not be turned into a chain observation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JointStateError {
    /// The configured joint order does not match what the robot publishes.
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("joint state carries {names} names but {positions} positions")]
    Malformed { names: usize, positions: usize },
}

/// Image payload could not be turned into a mono8 buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImageError {
    #[error("image has zero width or height")]
    Empty,
    #[error("row step {step} shorter than {row_bytes} bytes of pixels")]
    StepTooSmall { step: usize, row_bytes: usize },
    #[error("image buffer holds {actual} bytes, expected at least {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// Per-capture failures, reported to the trigger caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("invalid capture request: {0}")]
    InvalidRequest(String),
    #[error("pattern not found in camera {camera_id}")]
    DetectionFailure { camera_id: String },
    #[error("sensors unavailable: no fresh data from {}", .missing.join(", "))]
    SensorsUnavailable { missing: Vec<String> },
    #[error("capture cancelled")]
    Cancelled,
    #[error("camera {camera_id} has no {detect_on:?} image")]
    MissingImage {
        camera_id: String,
        detect_on: DetectSource,
    },
    #[error("camera {camera_id}: {source}")]
    Image {
        camera_id: String,
        #[source]
        source: ImageError,
    },
    #[error("observation time skew {skew_s:.3}s exceeds limit {limit_s:.3}s")]
    SkewExceeded { skew_s: f64, limit_s: f64 },
    /// The assembled record failed its own consistency checks.
    #[error("invalid sample: {0}")]
    InvalidSample(String),
}

impl CaptureError {
    /// Camera whose pattern was not found, if that is the failure.
    pub fn failed_camera(&self) -> Option<&str> {
        match self {
            CaptureError::DetectionFailure { camera_id } => Some(camera_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publisher channel disconnected")]
    Disconnected,
    #[error("publisher queue full")]
    Full,
}
