use super::{ComponentState, PipelineOrchestrator};
use crate::analyzer::{MotionAnalysisMetrics, MotionAnalyzer};
use crate::error::{PipelineError, Result};
use crate::pipeline::{
    analysis_channel, frame_queue, render_queue, AnalysisLink, FrameReceiver, RenderSender,
};
use crate::presenter::Presenter;
use crate::source::FrameSource;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub(super) const SOURCE: &str = "frame_source";
pub(super) const ANALYZER: &str = "motion_analyzer";
pub(super) const PRESENTER: &str = "presenter";

/// Orchestrator-side ends of the session channels plus the worker handles
pub(super) struct SessionWorkers {
    pub frame_rx: Option<FrameReceiver>,
    pub link: Option<AnalysisLink>,
    pub render_tx: Option<RenderSender>,
    pub source: Option<JoinHandle<Result<u64>>>,
    pub analyzer: Option<JoinHandle<Result<MotionAnalysisMetrics>>>,
    pub presenter: Option<JoinHandle<Result<u64>>>,
}

impl SessionWorkers {
    /// Close every orchestrator-held channel end
    pub fn close_channels(&mut self) {
        self.render_tx.take();
        self.link.take();
        self.frame_rx.take();
    }
}

impl PipelineOrchestrator {
    /// Register the pipeline components
    pub async fn initialize(&self) {
        let mut states = self.component_states.lock().await;
        states.insert(SOURCE.to_string(), ComponentState::Stopped);
        states.insert(ANALYZER.to_string(), ComponentState::Stopped);
        states.insert(PRESENTER.to_string(), ComponentState::Stopped);
    }

    /// Spawn the three workers, each wired to the session stop signal
    pub(super) async fn start_workers(&mut self) -> Result<SessionWorkers> {
        let sink = self.sink.take().ok_or(PipelineError::AlreadyRun)?;

        let (frame_tx, frame_rx) = frame_queue();
        let (link, endpoint) = analysis_channel();
        let (render_tx, render_rx) = render_queue();

        // Consumers start before the source
        self.set_component_state(PRESENTER, ComponentState::Starting)
            .await;
        let presenter = Presenter::new(
            sink,
            self.overlay.clone(),
            self.config.presenter.poll_interval(),
            self.cancellation_token.clone(),
        );
        let presenter_handle = tokio::spawn(presenter.run_loop(render_rx));
        self.set_component_state(PRESENTER, ComponentState::Running)
            .await;

        self.set_component_state(ANALYZER, ComponentState::Starting)
            .await;
        let analyzer = MotionAnalyzer::new(
            Arc::clone(&self.detector),
            self.config.analyzer.poll_interval(),
            self.cancellation_token.clone(),
        );
        let analyzer_handle = tokio::spawn(analyzer.run_loop(endpoint));
        self.set_component_state(ANALYZER, ComponentState::Running)
            .await;

        self.set_component_state(SOURCE, ComponentState::Starting)
            .await;
        let source = FrameSource::new(
            Arc::clone(&self.decoder),
            frame_tx,
            self.cancellation_token.clone(),
        );
        let source_id = self.source_id.clone();
        let source_handle = tokio::task::spawn_blocking(move || source.extract(&source_id));
        self.set_component_state(SOURCE, ComponentState::Running)
            .await;

        info!("Pipeline workers started for source '{}'", self.source_id);

        Ok(SessionWorkers {
            frame_rx: Some(frame_rx),
            link: Some(link),
            render_tx: Some(render_tx),
            source: Some(source_handle),
            analyzer: Some(analyzer_handle),
            presenter: Some(presenter_handle),
        })
    }
}
