use super::stats::{SessionStats, SessionSummary};
use super::types::{ComponentState, PipelineState, ShutdownReason};
use crate::analyzer::{FrameDiffDetector, MotionDetector};
use crate::config::{DecoderKind, FramewatchConfig, SinkKind};
use crate::error::{FramewatchError, Result};
use crate::presenter::{DirectorySink, LogSink, RegionOverlay, RenderSink};
use crate::source::{FrameDecoder, ImageSequenceDecoder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio_util::sync::CancellationToken;

/// Session coordinator owning the stop signal and the three pipeline stages
pub struct PipelineOrchestrator {
    pub(super) config: FramewatchConfig,
    pub(super) source_id: String,

    // Collaborators
    pub(super) decoder: Arc<dyn FrameDecoder>,
    pub(super) detector: Arc<dyn MotionDetector>,
    pub(super) sink: Option<Box<dyn RenderSink>>,
    pub(super) overlay: RegionOverlay,

    // Lifecycle management
    pub(super) state_tx: watch::Sender<PipelineState>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) shutdown_reason: Option<ShutdownReason>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) stats: SessionStats,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with collaborators chosen by the configuration
    pub fn new(config: FramewatchConfig) -> Result<Self> {
        PipelineOrchestratorBuilder::new().config(config).build()
    }

    pub fn builder() -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &FramewatchConfig {
        &self.config
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Stop signal shared with every worker of this session
    pub fn stop_signal(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Take the sender used to request an early shutdown.
    ///
    /// When taken before [`run`](Self::run), no OS signal handlers are
    /// installed and shutdown is requested through the returned sender only.
    pub fn take_shutdown_sender(&mut self) -> Option<oneshot::Sender<ShutdownReason>> {
        self.shutdown_sender.take()
    }

    pub fn shutdown_reason(&self) -> Option<&ShutdownReason> {
        self.shutdown_reason.as_ref()
    }

    /// Snapshot of the session counters and outcome
    pub fn summary(&self) -> SessionSummary {
        self.stats
            .summary(self.state(), self.shutdown_reason.as_ref())
    }
}

/// Builder for [`PipelineOrchestrator`]; unset collaborators are built from
/// the configuration
#[derive(Default)]
pub struct PipelineOrchestratorBuilder {
    config: Option<FramewatchConfig>,
    source_id: Option<String>,
    decoder: Option<Arc<dyn FrameDecoder>>,
    detector: Option<Arc<dyn MotionDetector>>,
    sink: Option<Box<dyn RenderSink>>,
}

impl PipelineOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FramewatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override `source.path`
    pub fn source_id<S: Into<String>>(mut self, source_id: S) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn MotionDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn sink(mut self, sink: Box<dyn RenderSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<PipelineOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let source_id = self.source_id.unwrap_or_else(|| config.source.path.clone());

        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => build_decoder(config.source.decoder)?,
        };

        let detector = self
            .detector
            .unwrap_or_else(|| Arc::new(FrameDiffDetector::from_config(&config.analyzer)));

        let sink = match self.sink {
            Some(sink) => sink,
            None => build_sink(&config)?,
        };

        let overlay = RegionOverlay::from_config(&config.presenter);
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(PipelineOrchestrator {
            config,
            source_id,
            decoder,
            detector,
            sink: Some(sink),
            overlay,
            state_tx,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            shutdown_reason: None,
            cancellation_token: CancellationToken::new(),
            stats: SessionStats::new(),
        })
    }
}

fn build_decoder(kind: DecoderKind) -> Result<Arc<dyn FrameDecoder>> {
    match kind {
        DecoderKind::Images => Ok(Arc::new(ImageSequenceDecoder::new())),
        #[cfg(all(feature = "gstreamer", target_os = "linux"))]
        DecoderKind::Gstreamer => Ok(Arc::new(crate::source::GstFileDecoder::new())),
        #[cfg(not(all(feature = "gstreamer", target_os = "linux")))]
        DecoderKind::Gstreamer => Err(FramewatchError::component(
            "frame_source",
            "the gstreamer decoder needs the `gstreamer` feature on Linux",
        )),
    }
}

fn build_sink(config: &FramewatchConfig) -> Result<Box<dyn RenderSink>> {
    match config.presenter.sink {
        SinkKind::Log => Ok(Box::new(LogSink::new())),
        SinkKind::Directory => Ok(Box::new(DirectorySink::new(&config.presenter.output_dir)?)),
        #[cfg(all(feature = "gstreamer", target_os = "linux"))]
        SinkKind::Window => Ok(Box::new(crate::presenter::GstWindowSink::new()?)),
        #[cfg(not(all(feature = "gstreamer", target_os = "linux")))]
        SinkKind::Window => Err(FramewatchError::component(
            "presenter",
            "the window sink needs the `gstreamer` feature on Linux",
        )),
    }
}
