use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FramewatchConfig {
    pub source: SourceConfig,
    pub analyzer: AnalyzerConfig,
    pub presenter: PresenterConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Source identifier handed to the decoder (file or directory path)
    #[serde(default = "default_source_path")]
    pub path: String,

    /// Decoder used to open the source
    #[serde(default = "default_decoder")]
    pub decoder: DecoderKind,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyzerConfig {
    /// Per-pixel delta above which a pixel counts as changed
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u32,

    /// Dilation passes applied to the change mask before region labelling
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,

    /// Wait applied to an idle request channel before re-checking the stop signal
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PresenterConfig {
    /// Regions with an area at or below this value are not rendered
    #[serde(default = "default_min_region_area")]
    pub min_region_area: u32,

    /// Blur the inside of every rendered region
    #[serde(default = "default_blur_regions")]
    pub blur_regions: bool,

    /// Gaussian sigma used for region blur
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,

    /// Outline color (RGB)
    #[serde(default = "default_outline_color")]
    pub outline_color: [u8; 3],

    /// Outline thickness in pixels
    #[serde(default = "default_outline_thickness")]
    pub outline_thickness: u32,

    /// Render sink receiving presented frames
    #[serde(default = "default_sink")]
    pub sink: SinkKind,

    /// Output directory for the directory sink
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Wait applied to an idle render queue before re-checking the stop signal
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Upper bound on joining a worker during shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,

    /// Throughput is summarised every this many frames
    #[serde(default = "default_report_interval")]
    pub report_interval_frames: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    /// Directory of still images, decoded in file name order
    Images,
    /// Video file decoded through GStreamer
    Gstreamer,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Log,
    Directory,
    Window,
}

impl DecoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderKind::Images => "images",
            DecoderKind::Gstreamer => "gstreamer",
        }
    }
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Log => "log",
            SinkKind::Directory => "directory",
            SinkKind::Window => "window",
        }
    }
}

impl AnalyzerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PresenterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PipelineConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl FramewatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("framewatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let (r, g, b) = {
            let color = default_outline_color();
            (color[0] as i64, color[1] as i64, color[2] as i64)
        };

        let settings = Config::builder()
            .set_default("source.path", default_source_path())?
            .set_default("source.decoder", default_decoder().as_str())?
            .set_default("analyzer.delta_threshold", default_delta_threshold())?
            .set_default("analyzer.dilate_iterations", default_dilate_iterations())?
            .set_default("analyzer.poll_interval_ms", default_poll_interval_ms() as i64)?
            .set_default("presenter.min_region_area", default_min_region_area())?
            .set_default("presenter.blur_regions", default_blur_regions())?
            .set_default("presenter.blur_sigma", default_blur_sigma() as f64)?
            .set_default("presenter.outline_color", vec![r, g, b])?
            .set_default("presenter.outline_thickness", default_outline_thickness())?
            .set_default("presenter.sink", default_sink().as_str())?
            .set_default("presenter.output_dir", default_output_dir())?
            .set_default("presenter.poll_interval_ms", default_poll_interval_ms() as i64)?
            .set_default(
                "pipeline.shutdown_timeout_seconds",
                default_shutdown_timeout() as i64,
            )?
            .set_default(
                "pipeline.report_interval_frames",
                default_report_interval() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // FRAMEWATCH__SOURCE__PATH style overrides
            .add_source(Environment::with_prefix("FRAMEWATCH").separator("__"))
            .build()?;

        let config: FramewatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Source path must not be empty".to_string(),
            ));
        }

        if self.analyzer.delta_threshold > u8::MAX as u32 {
            return Err(ConfigError::Message(
                "Analyzer delta_threshold must be at most 255".to_string(),
            ));
        }

        if self.analyzer.dilate_iterations > u8::MAX as u32 {
            return Err(ConfigError::Message(
                "Analyzer dilate_iterations must be at most 255".to_string(),
            ));
        }

        if self.analyzer.poll_interval_ms == 0 || self.presenter.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Poll intervals must be greater than 0".to_string(),
            ));
        }

        if self.presenter.blur_regions && self.presenter.blur_sigma <= 0.0 {
            return Err(ConfigError::Message(
                "Presenter blur_sigma must be greater than 0 when blur is enabled".to_string(),
            ));
        }

        if self.presenter.outline_thickness == 0 {
            return Err(ConfigError::Message(
                "Presenter outline_thickness must be greater than 0".to_string(),
            ));
        }

        if self.presenter.sink == SinkKind::Directory
            && self.presenter.output_dir.trim().is_empty()
        {
            return Err(ConfigError::Message(
                "Presenter output_dir is required for the directory sink".to_string(),
            ));
        }

        if self.pipeline.shutdown_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Pipeline shutdown_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.report_interval_frames == 0 {
            return Err(ConfigError::Message(
                "Pipeline report_interval_frames must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FramewatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                path: default_source_path(),
                decoder: default_decoder(),
            },
            analyzer: AnalyzerConfig {
                delta_threshold: default_delta_threshold(),
                dilate_iterations: default_dilate_iterations(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            presenter: PresenterConfig {
                min_region_area: default_min_region_area(),
                blur_regions: default_blur_regions(),
                blur_sigma: default_blur_sigma(),
                outline_color: default_outline_color(),
                outline_thickness: default_outline_thickness(),
                sink: default_sink(),
                output_dir: default_output_dir(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            pipeline: PipelineConfig {
                shutdown_timeout_seconds: default_shutdown_timeout(),
                report_interval_frames: default_report_interval(),
            },
        }
    }
}

// Default value functions
fn default_source_path() -> String {
    "input".to_string()
}
fn default_decoder() -> DecoderKind {
    if cfg!(all(feature = "gstreamer", target_os = "linux")) {
        DecoderKind::Gstreamer
    } else {
        DecoderKind::Images
    }
}

fn default_delta_threshold() -> u32 {
    25
}
fn default_dilate_iterations() -> u32 {
    2
}
fn default_poll_interval_ms() -> u64 {
    50
}

fn default_min_region_area() -> u32 {
    500
}
fn default_blur_regions() -> bool {
    true
}
fn default_blur_sigma() -> f32 {
    2.6
} // Equivalent to a 15x15 Gaussian kernel
fn default_outline_color() -> [u8; 3] {
    [0, 255, 0]
}
fn default_outline_thickness() -> u32 {
    2
}
fn default_sink() -> SinkKind {
    SinkKind::Log
}
fn default_output_dir() -> String {
    "./frames_out".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}
fn default_report_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FramewatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyzer.delta_threshold, 25);
        assert_eq!(config.presenter.min_region_area, 500);
        assert_eq!(config.presenter.sink, SinkKind::Log);
    }

    #[test]
    fn test_config_validation() {
        let mut config = FramewatchConfig::default();
        config.source.path = "   ".to_string();
        assert!(config.validate().is_err());

        config.source.path = "clip.mp4".to_string();
        assert!(config.validate().is_ok());

        config.analyzer.delta_threshold = 300;
        assert!(config.validate().is_err());
        config.analyzer.delta_threshold = 25;

        config.presenter.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.presenter.poll_interval_ms = 50;

        config.presenter.sink = SinkKind::Directory;
        config.presenter.output_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framewatch.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[source]\npath = \"/videos/street.mp4\"\ndecoder = \"images\"\n\n\
             [presenter]\nmin_region_area = 250\nsink = \"directory\"\n"
        )
        .unwrap();

        let config = FramewatchConfig::load_from_file(&path).unwrap();
        assert_eq!(config.source.path, "/videos/street.mp4");
        assert_eq!(config.source.decoder, DecoderKind::Images);
        assert_eq!(config.presenter.min_region_area, 250);
        assert_eq!(config.presenter.sink, SinkKind::Directory);
        // Untouched sections keep their defaults
        assert_eq!(config.analyzer.dilate_iterations, 2);
        assert_eq!(config.pipeline.shutdown_timeout_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FramewatchConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.source.path, "input");
        assert_eq!(config.presenter.outline_color, [0, 255, 0]);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&FramewatchConfig::default()).unwrap();
        let parsed: FramewatchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.presenter.outline_thickness, 2);
        assert_eq!(parsed.pipeline.report_interval_frames, 30);
    }
}
