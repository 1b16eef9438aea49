pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod frame;
pub mod mock;
pub mod pipeline;
pub mod presenter;
pub mod source;

pub use analyzer::{FrameDiffDetector, MotionAnalyzer, MotionDetector, MotionRegion};
pub use app::{
    ComponentState, PipelineOrchestrator, PipelineOrchestratorBuilder, PipelineState,
    SessionSummary, ShutdownReason,
};
pub use config::FramewatchConfig;
pub use error::{FramewatchError, Result};
pub use frame::{FrameData, FrameFormat};
pub use presenter::{DirectorySink, LogSink, Presenter, RegionOverlay, RenderSink};
pub use source::{DecodeSession, FrameDecoder, FrameSource, ImageSequenceDecoder};
