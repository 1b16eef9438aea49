use super::startup::SessionWorkers;
use super::{PipelineOrchestrator, PipelineState, SessionSummary, ShutdownReason};
use crate::error::{PipelineError, Result};
use crate::frame::FrameData;
use crate::pipeline::{SourceMessage, WARMUP_THRESHOLD};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

impl PipelineOrchestrator {
    /// Run one session to completion.
    ///
    /// Returns the session summary after a clean shutdown (end of stream or
    /// a shutdown request), or the root cause of the failure. A session runs
    /// at most once.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        if self.state() != PipelineState::Idle {
            return Err(PipelineError::AlreadyRun.into());
        }
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or(PipelineError::AlreadyRun)?;

        info!(
            "Session {} started at {} for source '{}'",
            self.stats.session_id, self.stats.started_at, self.source_id
        );

        let signal_tasks = match self.shutdown_sender.take() {
            Some(sender) => self.setup_signal_handlers(sender),
            None => Vec::new(),
        };

        self.initialize().await;
        let mut workers = self.start_workers().await?;

        let result = match self.drive(&mut workers, shutdown_receiver).await {
            Ok(reason) => self.drain(workers, reason).await,
            Err(cause) => Err(self.fail(workers, cause).await),
        };

        for task in signal_tasks {
            task.abort();
        }

        let summary = self.summary();
        info!(
            "Session {} finished: {} ({} frame(s) received, {} presented)",
            summary.session_id,
            summary.final_state,
            summary.frames_received,
            summary.frames_presented
        );

        result.map(|()| summary)
    }

    /// Main loop: drain the frame queue and drive the analysis handshake.
    ///
    /// Returns the reason for a graceful shutdown, or the error that ends
    /// the session.
    pub(super) async fn drive(
        &mut self,
        workers: &mut SessionWorkers,
        mut shutdown_receiver: oneshot::Receiver<ShutdownReason>,
    ) -> Result<ShutdownReason> {
        let mut frame_rx = workers
            .frame_rx
            .take()
            .ok_or(PipelineError::SourceDisconnected)?;
        let mut shutdown_armed = true;

        let outcome = loop {
            let message = tokio::select! {
                requested = &mut shutdown_receiver, if shutdown_armed => {
                    match requested {
                        Ok(reason) => {
                            info!("Shutdown requested: {}", reason);
                            break Ok(reason);
                        }
                        Err(_) => {
                            // Sender dropped without a request
                            shutdown_armed = false;
                            continue;
                        }
                    }
                }
                message = frame_rx.recv() => message,
            };

            match message {
                Some(SourceMessage::Frame(frame)) => {
                    if let Err(e) = self.handle_frame(workers, frame).await {
                        break Err(e);
                    }
                }
                Some(SourceMessage::EndOfStream { frames }) => {
                    if self.state() == PipelineState::Idle {
                        break Err(PipelineError::EmptySource.into());
                    }
                    info!("End of stream after {} frame(s)", frames);
                    break Ok(ShutdownReason::EndOfStream);
                }
                Some(SourceMessage::Failed(e)) => break Err(e.into()),
                None => break Err(PipelineError::SourceDisconnected.into()),
            }
        };

        workers.frame_rx = Some(frame_rx);
        outcome
    }

    /// Send one frame through the analysis handshake and forward the reply
    async fn handle_frame(&mut self, workers: &mut SessionWorkers, frame: FrameData) -> Result<()> {
        if self.state() == PipelineState::Idle {
            self.transition(PipelineState::Running)?;
        }

        let frame_id = frame.id;
        if let Some(fps) = self.stats.record_frame(Instant::now()) {
            debug!("Frame {} received ({:.1} fps)", frame_id, fps);
        } else {
            debug!("Frame {} received", frame_id);
        }

        let report_interval = self.config.pipeline.report_interval_frames;
        if report_interval > 0 && self.stats.frames_received % report_interval == 0 {
            info!(
                "Processed {} frame(s), average {:.1} fps",
                self.stats.frames_received,
                self.stats.average_fps()
            );
        }

        let link = workers
            .link
            .as_mut()
            .ok_or(PipelineError::AnalyzerDisconnected)?;
        let expect_reply = self.stats.frames_received >= WARMUP_THRESHOLD;

        let Some(reply) = link.exchange(frame, expect_reply).await? else {
            trace!("Frame {} is a warm-up frame", frame_id);
            return Ok(());
        };

        let render_tx = workers
            .render_tx
            .as_ref()
            .ok_or(PipelineError::PresenterDisconnected)?;
        render_tx
            .send(reply.into())
            .map_err(|_| PipelineError::PresenterDisconnected)?;
        self.stats.results_forwarded += 1;

        Ok(())
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(
        &self,
        shutdown_sender: oneshot::Sender<ShutdownReason>,
    ) -> Vec<JoinHandle<()>> {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        let mut tasks = Vec::new();

        // Handle SIGTERM - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tasks.push(tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            }));
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tasks.push(tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }));

        tasks
    }
}
