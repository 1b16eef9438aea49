use super::overlay::RegionOverlay;
use super::sink::RenderSink;
use crate::analyzer::MotionRegion;
use crate::error::{FramewatchError, RenderError, Result};
use crate::frame::FrameData;
use crate::pipeline::{RenderMessage, RenderReceiver};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Presentation stage: filters regions, draws the overlay and feeds the sink
pub struct Presenter {
    sink: Arc<Mutex<Box<dyn RenderSink>>>,
    overlay: Arc<RegionOverlay>,
    poll_interval: Duration,
    cancel: CancellationToken,
    presented: u64,
}

impl Presenter {
    pub fn new(
        sink: Box<dyn RenderSink>,
        overlay: RegionOverlay,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            overlay: Arc::new(overlay),
            poll_interval,
            cancel,
            presented: 0,
        }
    }

    /// Present queued results until end of stream, a closed queue or an idle
    /// wait with the stop signal set. Returns the number of frames presented.
    pub async fn run_loop(mut self, mut render_rx: RenderReceiver) -> Result<u64> {
        info!("Presenter task started");

        let outcome = loop {
            match timeout(self.poll_interval, render_rx.recv()).await {
                Ok(Some(RenderMessage::Present { frame, regions })) => {
                    if let Err(e) = self.present(frame, regions).await {
                        break Err(e);
                    }
                }
                Ok(Some(RenderMessage::EndOfStream)) => {
                    debug!("End of stream reached the presenter");
                    break Ok(());
                }
                Ok(None) => {
                    debug!("Render queue closed");
                    break Ok(());
                }
                Err(_) => {
                    if self.cancel.is_cancelled() {
                        debug!("Stop signal observed by presenter");
                        break Ok(());
                    }
                }
            }
        };

        if let Err(e) = self.sink.lock().close() {
            warn!("Render sink did not close cleanly: {}", e);
            if outcome.is_ok() {
                return Err(e.into());
            }
        }

        info!("Presenter task ended ({} frame(s) presented)", self.presented);
        outcome.map(|()| self.presented)
    }

    async fn present(&mut self, frame: FrameData, regions: Vec<MotionRegion>) -> Result<()> {
        let frame_id = frame.id;
        let sink = Arc::clone(&self.sink);
        let overlay = Arc::clone(&self.overlay);

        let kept = tokio::task::spawn_blocking(move || -> std::result::Result<usize, RenderError> {
            let kept = overlay.filter_regions(&regions, frame.width, frame.height);
            let rendered = overlay.render(&frame, &kept)?;
            sink.lock().present(&rendered, &kept)?;
            Ok(kept.len())
        })
        .await
        .map_err(|e| {
            FramewatchError::from(RenderError::Sink {
                details: format!("render task for frame {} failed: {}", frame_id, e),
            })
        })??;

        self.presented += 1;
        debug!("Presented frame {} with {} region(s)", frame_id, kept);
        Ok(())
    }
}
