use super::decoder::FrameDecoder;
use crate::error::{FramewatchError, Result};
use crate::pipeline::{FrameSender, SourceMessage};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Source stage: pushes decoded frames into the frame queue.
///
/// Runs synchronously; the orchestrator places it on a blocking thread.
pub struct FrameSource {
    decoder: Arc<dyn FrameDecoder>,
    frame_tx: FrameSender,
    cancel: CancellationToken,
}

impl FrameSource {
    pub fn new(
        decoder: Arc<dyn FrameDecoder>,
        frame_tx: FrameSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            decoder,
            frame_tx,
            cancel,
        }
    }

    /// Open `source_id` and produce frames until exhausted.
    ///
    /// Returns the number of frames pushed. Open and read failures are sent
    /// to the orchestrator as [`SourceMessage::Failed`] and returned.
    pub fn extract(self, source_id: &str) -> Result<u64> {
        info!("Opening source: {}", source_id);

        let mut session = match self.decoder.open(source_id) {
            Ok(session) => session,
            Err(e) => {
                error!("Could not open source: {}", e);
                let message = e.to_string();
                if self.frame_tx.send(SourceMessage::Failed(e)).is_err() {
                    debug!("Frame queue closed before the open failure was delivered");
                }
                return Err(FramewatchError::component("frame_source".to_string(), message));
            }
        };

        let mut produced = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop signal observed, source stopped after {} frame(s)", produced);
                return Ok(produced);
            }

            match session.next_frame() {
                Ok(Some(mut frame)) => {
                    produced += 1;
                    frame.id = produced;
                    trace!("Queueing frame {}", frame.id);

                    if self.frame_tx.send(SourceMessage::Frame(frame)).is_err() {
                        debug!("Frame queue closed, source stopping");
                        return Ok(produced);
                    }
                }
                Ok(None) => {
                    info!("Source exhausted after {} frame(s)", produced);
                    if self
                        .frame_tx
                        .send(SourceMessage::EndOfStream { frames: produced })
                        .is_err()
                    {
                        debug!("Frame queue closed before the end marker was delivered");
                    }
                    return Ok(produced);
                }
                Err(e) => {
                    error!("Source read failed after {} frame(s): {}", produced, e);
                    let message = e.to_string();
                    if self.frame_tx.send(SourceMessage::Failed(e)).is_err() {
                        debug!("Frame queue closed before the read failure was delivered");
                    }
                    return Err(FramewatchError::component("frame_source".to_string(), message));
                }
            }
        }
    }
}
