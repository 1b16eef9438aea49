use super::startup::{SessionWorkers, ANALYZER, PRESENTER, SOURCE};
use super::{ComponentState, PipelineOrchestrator, PipelineState, ShutdownReason};
use crate::error::{FramewatchError, PipelineError, Result};
use crate::pipeline::RenderMessage;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl PipelineOrchestrator {
    /// Graceful shutdown: end marker to the presenter, close the request
    /// channel, set the stop signal and join every worker
    pub(super) async fn drain(
        &mut self,
        mut workers: SessionWorkers,
        reason: ShutdownReason,
    ) -> Result<()> {
        self.transition(PipelineState::Draining)?;
        info!("Beginning graceful shutdown ({})", reason);
        self.shutdown_reason = Some(reason);

        if let Some(render_tx) = workers.render_tx.take() {
            if render_tx.send(RenderMessage::EndOfStream).is_err() {
                warn!("Presenter was gone before the end-of-stream marker");
            }
        }
        workers.close_channels();
        self.cancellation_token.cancel();

        match self.join_workers(&mut workers).await {
            None => {
                self.transition(PipelineState::Terminated)?;
                info!("Graceful shutdown completed");
                Ok(())
            }
            Some(e) => {
                error!("Shutdown failed: {}", e);
                self.shutdown_reason = Some(ShutdownReason::Error(e.to_string()));
                self.transition(PipelineState::Failed)?;
                Err(e)
            }
        }
    }

    /// Failure path: stop everything and report the most specific cause.
    ///
    /// A disconnected channel is only the symptom of a worker that ended with
    /// an error; that worker's error is returned in its place.
    pub(super) async fn fail(
        &mut self,
        mut workers: SessionWorkers,
        cause: FramewatchError,
    ) -> FramewatchError {
        error!("Pipeline failed: {}", cause);
        if let Err(e) = self.transition(PipelineState::Failed) {
            warn!("{}", e);
        }

        self.cancellation_token.cancel();
        workers.close_channels();

        let source = self.join_source(&mut workers).await;
        let analyzer = self.join_analyzer(&mut workers).await;
        let presenter = self.join_presenter(&mut workers).await;

        let root = match cause {
            FramewatchError::Pipeline(PipelineError::AnalyzerDisconnected) => {
                analyzer.err().unwrap_or(cause)
            }
            FramewatchError::Pipeline(PipelineError::PresenterDisconnected) => {
                presenter.err().unwrap_or(cause)
            }
            FramewatchError::Pipeline(PipelineError::SourceDisconnected) => {
                source.err().unwrap_or(cause)
            }
            cause => cause,
        };

        self.shutdown_reason = Some(ShutdownReason::Error(root.to_string()));
        root
    }

    /// Join all workers in pipeline order; returns the first error
    async fn join_workers(&mut self, workers: &mut SessionWorkers) -> Option<FramewatchError> {
        let source = self.join_source(workers).await.err();
        let analyzer = self.join_analyzer(workers).await.err();
        let presenter = self.join_presenter(workers).await.err();
        source.or(analyzer).or(presenter)
    }

    async fn join_source(&mut self, workers: &mut SessionWorkers) -> Result<()> {
        let Some(handle) = workers.source.take() else {
            return Ok(());
        };
        let produced = self.stop_component(SOURCE, handle).await?;
        info!("Frame source produced {} frame(s)", produced);
        Ok(())
    }

    async fn join_analyzer(&mut self, workers: &mut SessionWorkers) -> Result<()> {
        let Some(handle) = workers.analyzer.take() else {
            return Ok(());
        };
        let metrics = self.stop_component(ANALYZER, handle).await?;
        info!(
            "Motion analyzer served {} request(s), {} region(s) detected",
            metrics.requests_received, metrics.regions_detected
        );
        Ok(())
    }

    async fn join_presenter(&mut self, workers: &mut SessionWorkers) -> Result<()> {
        let Some(handle) = workers.presenter.take() else {
            return Ok(());
        };
        let presented = self.stop_component(PRESENTER, handle).await?;
        self.stats.frames_presented = presented;
        Ok(())
    }

    /// Wait for one worker, bounded by the shutdown timeout
    async fn stop_component<T>(
        &self,
        component: &str,
        handle: JoinHandle<Result<T>>,
    ) -> Result<T> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let limit = self.config.pipeline.shutdown_timeout();
        match timeout(limit, handle).await {
            Ok(Ok(Ok(value))) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(value)
            }
            Ok(Ok(Err(e))) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component ended with error: {}", component, e);
                Err(e)
            }
            Ok(Err(join_error)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component task failed: {}", component, join_error);
                Err(PipelineError::WorkerFailed {
                    component: component.to_string(),
                    details: join_error.to_string(),
                }
                .into())
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(PipelineError::ShutdownTimeout {
                    component: component.to_string(),
                    seconds: limit.as_secs(),
                }
                .into())
            }
        }
    }
}
