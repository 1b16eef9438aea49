//! Runs one session on a synthetic moving square with the frame-difference
//! detector and the log sink.
//!
//! ```text
//! cargo run --example synthetic_pipeline -- 60
//! ```

use framewatch::mock::SyntheticDecoder;
use framewatch::{FrameDiffDetector, FramewatchConfig, LogSink, PipelineOrchestrator};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framewatch=info")),
        )
        .init();

    let frames: u64 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(30);

    let mut config = FramewatchConfig::default();
    config.presenter.min_region_area = 50;

    let detector = FrameDiffDetector::from_config(&config.analyzer);
    let mut orchestrator = PipelineOrchestrator::builder()
        .config(config)
        .source_id("synthetic")
        .decoder(Arc::new(
            SyntheticDecoder::new(frames)
                .with_size(160, 120)
                .with_square(16, 6),
        ))
        .detector(Arc::new(detector))
        .sink(Box::new(LogSink::new()))
        .build()?;

    let summary = orchestrator.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
