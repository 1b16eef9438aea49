//! Channels binding the pipeline stages together.
//!
//! - FrameQueue: FrameSource -> orchestrator, unbounded FIFO of [`SourceMessage`]
//! - ResultChannel: orchestrator <-> analyzer, half-duplex, see [`handshake`]
//! - RenderQueue: orchestrator -> presenter, unbounded FIFO of [`RenderMessage`]

mod handshake;

pub use handshake::{
    analysis_channel, AnalysisLink, AnalysisReply, AnalyzerEndpoint, RequestPoll,
    WARMUP_THRESHOLD,
};

use crate::analyzer::MotionRegion;
use crate::error::SourceError;
use crate::frame::FrameData;
use tokio::sync::mpsc;

/// Message produced by the frame source
#[derive(Debug)]
pub enum SourceMessage {
    Frame(FrameData),
    /// The source is exhausted after producing `frames` frames
    EndOfStream { frames: u64 },
    /// The source could not be opened or read
    Failed(SourceError),
}

/// Message consumed by the presenter
#[derive(Debug)]
pub enum RenderMessage {
    Present {
        frame: FrameData,
        regions: Vec<MotionRegion>,
    },
    EndOfStream,
}

impl From<AnalysisReply> for RenderMessage {
    fn from(reply: AnalysisReply) -> Self {
        RenderMessage::Present {
            frame: reply.frame,
            regions: reply.regions,
        }
    }
}

pub type FrameSender = mpsc::UnboundedSender<SourceMessage>;
pub type FrameReceiver = mpsc::UnboundedReceiver<SourceMessage>;
pub type RenderSender = mpsc::UnboundedSender<RenderMessage>;
pub type RenderReceiver = mpsc::UnboundedReceiver<RenderMessage>;

pub fn frame_queue() -> (FrameSender, FrameReceiver) {
    mpsc::unbounded_channel()
}

pub fn render_queue() -> (RenderSender, RenderReceiver) {
    mpsc::unbounded_channel()
}
