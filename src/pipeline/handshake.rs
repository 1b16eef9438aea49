use crate::analyzer::MotionRegion;
use crate::error::PipelineError;
use crate::frame::FrameData;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::trace;

/// Number of requests the orchestrator sends before it starts awaiting
/// replies. The analyzer consumes the first frame to seed its retained slot
/// and answers from the second request onwards.
pub const WARMUP_THRESHOLD: u64 = 2;

/// Analyzer answer to one request: the original frame and its regions
#[derive(Debug)]
pub struct AnalysisReply {
    pub frame: FrameData,
    pub regions: Vec<MotionRegion>,
}

/// Create the half-duplex result channel between orchestrator and analyzer
pub fn analysis_channel() -> (AnalysisLink, AnalyzerEndpoint) {
    let (request_tx, request_rx) = mpsc::channel(1);
    let (reply_tx, reply_rx) = mpsc::channel(1);

    (
        AnalysisLink {
            request_tx,
            reply_rx,
            requests_sent: 0,
            replies_received: 0,
        },
        AnalyzerEndpoint {
            request_rx,
            reply_tx,
        },
    )
}

/// Orchestrator side of the result channel.
///
/// [`AnalysisLink::exchange`] takes `&mut self` and does not return until the
/// reply (if any) has arrived, so at most one exchange is ever in flight.
#[derive(Debug)]
pub struct AnalysisLink {
    request_tx: mpsc::Sender<FrameData>,
    reply_rx: mpsc::Receiver<AnalysisReply>,
    requests_sent: u64,
    replies_received: u64,
}

impl AnalysisLink {
    /// Send one frame and, when `expect_reply` is set, block for its reply
    pub async fn exchange(
        &mut self,
        frame: FrameData,
        expect_reply: bool,
    ) -> Result<Option<AnalysisReply>, PipelineError> {
        let frame_id = frame.id;

        self.request_tx
            .send(frame)
            .await
            .map_err(|_| PipelineError::AnalyzerDisconnected)?;
        self.requests_sent += 1;

        if !expect_reply {
            trace!("Frame {} sent without awaiting a reply", frame_id);
            return Ok(None);
        }

        let reply = self
            .reply_rx
            .recv()
            .await
            .ok_or(PipelineError::AnalyzerDisconnected)?;

        if reply.frame.id != frame_id {
            return Err(PipelineError::ProtocolViolation {
                details: format!(
                    "reply carries frame {} while frame {} is in flight",
                    reply.frame.id, frame_id
                ),
            });
        }

        self.replies_received += 1;
        trace!(
            "Frame {} round trip complete ({} region(s))",
            frame_id,
            reply.regions.len()
        );
        Ok(Some(reply))
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    pub fn replies_received(&self) -> u64 {
        self.replies_received
    }
}

/// Outcome of waiting for the next analyzer request
#[derive(Debug)]
pub enum RequestPoll {
    Request(FrameData),
    /// Nothing arrived within the wait
    Idle,
    /// The orchestrator closed the channel
    Closed,
}

/// Analyzer side of the result channel
#[derive(Debug)]
pub struct AnalyzerEndpoint {
    request_rx: mpsc::Receiver<FrameData>,
    reply_tx: mpsc::Sender<AnalysisReply>,
}

impl AnalyzerEndpoint {
    /// Wait up to `wait` for the next request
    pub async fn next_request(&mut self, wait: Duration) -> RequestPoll {
        match timeout(wait, self.request_rx.recv()).await {
            Ok(Some(frame)) => RequestPoll::Request(frame),
            Ok(None) => RequestPoll::Closed,
            Err(_) => RequestPoll::Idle,
        }
    }

    pub async fn reply(&self, reply: AnalysisReply) -> Result<(), PipelineError> {
        self.reply_tx
            .send(reply)
            .await
            .map_err(|_| PipelineError::OrchestratorDisconnected)
    }
}
