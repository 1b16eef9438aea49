use super::detector::MotionDetector;
use super::region::MotionRegion;
use crate::error::{AnalyzerError, FramewatchError, PipelineError, Result};
use crate::frame::FrameData;
use crate::pipeline::{AnalysisReply, AnalyzerEndpoint, RequestPoll};

use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters reported by the analyzer when its loop ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionAnalysisMetrics {
    pub requests_received: u64,
    pub replies_sent: u64,
    pub regions_detected: u64,
}

/// Analysis stage: compares each incoming frame with the one before it.
///
/// Holds a single retained grayscale frame. The first request only seeds that
/// slot and gets no reply; every later request is answered with the original
/// frame and the regions found against the retained frame, after which the
/// slot is overwritten with the current frame.
pub struct MotionAnalyzer {
    detector: Arc<dyn MotionDetector>,
    retained: Option<GrayImage>,
    poll_interval: Duration,
    cancel: CancellationToken,
    metrics: MotionAnalysisMetrics,
}

impl MotionAnalyzer {
    pub fn new(
        detector: Arc<dyn MotionDetector>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            detector,
            retained: None,
            poll_interval,
            cancel,
            metrics: MotionAnalysisMetrics::default(),
        }
    }

    pub fn has_retained_frame(&self) -> bool {
        self.retained.is_some()
    }

    pub fn metrics(&self) -> &MotionAnalysisMetrics {
        &self.metrics
    }

    /// Serve requests until the stop signal is observed or the channel closes
    pub async fn run_loop(mut self, mut endpoint: AnalyzerEndpoint) -> Result<MotionAnalysisMetrics> {
        info!("Motion analysis task started");

        loop {
            match endpoint.next_request(self.poll_interval).await {
                RequestPoll::Request(frame) => {
                    self.metrics.requests_received += 1;

                    let Some(reply) = self.handle_request(frame).await? else {
                        continue;
                    };

                    let region_count = reply.regions.len() as u64;
                    match endpoint.reply(reply).await {
                        Ok(()) => {
                            self.metrics.replies_sent += 1;
                            self.metrics.regions_detected += region_count;
                        }
                        Err(PipelineError::OrchestratorDisconnected) => {
                            warn!("Orchestrator went away before the reply was delivered");
                            break;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                RequestPoll::Idle => {
                    if self.cancel.is_cancelled() {
                        debug!("Stop signal observed by motion analyzer");
                        break;
                    }
                }
                RequestPoll::Closed => {
                    debug!("Request channel closed");
                    break;
                }
            }
        }

        info!(
            "Motion analysis task ended ({} requests, {} replies)",
            self.metrics.requests_received, self.metrics.replies_sent
        );
        Ok(self.metrics)
    }

    /// Process one request; `None` means the frame only seeded the retained slot
    pub async fn handle_request(&mut self, frame: FrameData) -> Result<Option<AnalysisReply>> {
        let detector = Arc::clone(&self.detector);
        let previous = self.retained.take();
        let frame_id = frame.id;

        let (frame, current, regions) = tokio::task::spawn_blocking(
            move || -> Result<(FrameData, GrayImage, Option<Vec<MotionRegion>>)> {
                let current = frame.to_gray_image()?;
                let regions = match previous {
                    Some(previous) => Some(detector.detect(&current, &previous)?),
                    None => None,
                };
                Ok((frame, current, regions))
            },
        )
        .await
        .map_err(|e| {
            FramewatchError::from(AnalyzerError::Detection {
                details: format!("detection task for frame {} failed: {}", frame_id, e),
            })
        })??;

        self.retained = Some(current);

        match regions {
            None => {
                info!("Retained frame seeded with warm-up frame {}", frame.id);
                Ok(None)
            }
            Some(regions) => {
                debug!("Frame {}: {} region(s)", frame.id, regions.len());
                Ok(Some(AnalysisReply { frame, regions }))
            }
        }
    }
}
