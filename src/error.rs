use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramewatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FramewatchError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while converting frame pixel data
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame {id} has {actual} bytes, expected {expected}")]
    InvalidSize {
        id: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Frame decode failed: {details}")]
    Decode { details: String },
}

/// Errors raised by the decode collaborator
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source '{source_id}': {details}")]
    Open { source_id: String, details: String },

    #[error("Failed to read frame: {details}")]
    Read { details: String },
}

/// Errors raised by the analysis stage
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Frame dimensions {current:?} differ from retained frame {previous:?}")]
    DimensionMismatch {
        current: (u32, u32),
        previous: (u32, u32),
    },

    #[error("Motion detection failed: {details}")]
    Detection { details: String },
}

/// Errors raised by the presentation stage
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Overlay failed: {details}")]
    Overlay { details: String },

    #[error("Render sink failed: {details}")]
    Sink { details: String },
}

/// Protocol and lifecycle failures of the pipeline itself
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source finished without producing any frame")]
    EmptySource,

    #[error("Frame source disconnected without an end-of-stream marker")]
    SourceDisconnected,

    #[error("Motion analyzer disconnected")]
    AnalyzerDisconnected,

    #[error("Presenter disconnected")]
    PresenterDisconnected,

    #[error("Orchestrator closed the result channel")]
    OrchestratorDisconnected,

    #[error("Handshake protocol violation: {details}")]
    ProtocolViolation { details: String },

    #[error("Invalid pipeline state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Worker {component} failed: {details}")]
    WorkerFailed { component: String, details: String },

    #[error("Worker {component} did not stop within {seconds}s")]
    ShutdownTimeout { component: String, seconds: u64 },

    #[error("Pipeline session already ran")]
    AlreadyRun,
}

pub type Result<T> = std::result::Result<T, FramewatchError>;
