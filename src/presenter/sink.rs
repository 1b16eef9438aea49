use crate::analyzer::MotionRegion;
use crate::error::RenderError;
use crate::frame::FrameData;

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Render collaborator receiving each overlaid frame with its surviving regions
pub trait RenderSink: Send {
    fn present(&mut self, frame: &FrameData, regions: &[MotionRegion]) -> Result<(), RenderError>;

    /// Release resources once the presenter stops
    fn close(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Sink that only logs what it would have shown
#[derive(Debug, Default)]
pub struct LogSink {
    presented: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSink for LogSink {
    fn present(&mut self, frame: &FrameData, regions: &[MotionRegion]) -> Result<(), RenderError> {
        self.presented += 1;
        info!(
            "Frame {} ({}x{}): {} region(s) {:?}",
            frame.id,
            frame.width,
            frame.height,
            regions.len(),
            regions
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), RenderError> {
        info!("Log sink closed after {} frame(s)", self.presented);
        Ok(())
    }
}

const JPEG_QUALITY: u8 = 90;

/// Sink writing every presented frame as a numbered JPEG file
#[derive(Debug)]
pub struct DirectorySink {
    output_dir: PathBuf,
    written: u64,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self, RenderError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(|e| RenderError::Sink {
            details: format!("Failed to create {}: {}", output_dir.display(), e),
        })?;

        info!("Writing presented frames to {}", output_dir.display());
        Ok(Self {
            output_dir,
            written: 0,
        })
    }

    pub fn frame_path(&self, frame_id: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{:06}.jpg", frame_id))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl RenderSink for DirectorySink {
    fn present(&mut self, frame: &FrameData, regions: &[MotionRegion]) -> Result<(), RenderError> {
        let image = frame.to_rgb_image().map_err(|e| RenderError::Sink {
            details: format!("frame {}: {}", frame.id, e),
        })?;

        let path = self.frame_path(frame.id);
        let file = File::create(&path).map_err(|e| RenderError::Sink {
            details: format!("Failed to create {}: {}", path.display(), e),
        })?;

        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| RenderError::Sink {
                details: format!("Failed to encode {}: {}", path.display(), e),
            })?;

        self.written += 1;
        debug!(
            "Wrote {} with {} region(s)",
            path.display(),
            regions.len()
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), RenderError> {
        info!(
            "Directory sink closed after writing {} frame(s) to {}",
            self.written,
            self.output_dir.display()
        );
        Ok(())
    }
}

#[cfg(all(feature = "gstreamer", target_os = "linux"))]
pub use window::GstWindowSink;

#[cfg(all(feature = "gstreamer", target_os = "linux"))]
mod window {
    use super::RenderSink;
    use crate::analyzer::MotionRegion;
    use crate::error::RenderError;
    use crate::frame::FrameData;

    use gstreamer::prelude::*;
    use gstreamer::Pipeline;
    use gstreamer_app::AppSrc;
    use tracing::{debug, info, warn};

    /// On-screen sink pushing RGB frames into an `autovideosink` pipeline.
    ///
    /// The pipeline is built on the first frame, once its size is known.
    #[derive(Default)]
    pub struct GstWindowSink {
        pipeline: Option<(Pipeline, AppSrc)>,
        size: (u32, u32),
    }

    impl GstWindowSink {
        pub fn new() -> Result<Self, RenderError> {
            gstreamer::init().map_err(|e| RenderError::Sink {
                details: format!("Failed to initialize GStreamer: {}", e),
            })?;
            Ok(Self::default())
        }

        fn start(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
            let pipeline_desc = format!(
                "appsrc name=src is-live=true format=time \
                 caps=video/x-raw,format=RGB,width={},height={},framerate=0/1 ! \
                 queue max-size-buffers=1 leaky=downstream ! \
                 videoconvert ! \
                 autovideosink sync=false",
                width, height
            );
            info!("Creating GStreamer display pipeline: {}", pipeline_desc);

            let pipeline = gstreamer::parse::launch(&pipeline_desc)
                .map_err(|e| RenderError::Sink {
                    details: format!("Failed to create display pipeline: {}", e),
                })?
                .downcast::<Pipeline>()
                .map_err(|_| RenderError::Sink {
                    details: "Failed to downcast to Pipeline".to_string(),
                })?;

            let appsrc = pipeline
                .by_name("src")
                .ok_or_else(|| RenderError::Sink {
                    details: "Failed to get appsrc element".to_string(),
                })?
                .downcast::<AppSrc>()
                .map_err(|_| RenderError::Sink {
                    details: "Failed to downcast to AppSrc".to_string(),
                })?;

            pipeline
                .set_state(gstreamer::State::Playing)
                .map_err(|e| RenderError::Sink {
                    details: format!("Failed to start display pipeline: {}", e),
                })?;

            self.pipeline = Some((pipeline, appsrc));
            self.size = (width, height);
            Ok(())
        }
    }

    impl RenderSink for GstWindowSink {
        fn present(
            &mut self,
            frame: &FrameData,
            _regions: &[MotionRegion],
        ) -> Result<(), RenderError> {
            if self.pipeline.is_none() {
                self.start(frame.width, frame.height)?;
            } else if self.size != frame.dimensions() {
                return Err(RenderError::Sink {
                    details: format!(
                        "Frame {} is {:?}, display was opened at {:?}",
                        frame.id,
                        frame.dimensions(),
                        self.size
                    ),
                });
            }

            let Some((_, appsrc)) = self.pipeline.as_ref() else {
                return Err(RenderError::Sink {
                    details: "Display pipeline not initialized".to_string(),
                });
            };

            let image = frame.to_rgb_image().map_err(|e| RenderError::Sink {
                details: format!("frame {}: {}", frame.id, e),
            })?;
            let buffer = gstreamer::Buffer::from_mut_slice(image.into_raw());

            appsrc.push_buffer(buffer).map_err(|e| RenderError::Sink {
                details: format!("Failed to push buffer to display pipeline: {:?}", e),
            })?;

            debug!("Frame {} rendered via GStreamer pipeline", frame.id);
            Ok(())
        }

        fn close(&mut self) -> Result<(), RenderError> {
            if let Some((pipeline, appsrc)) = self.pipeline.take() {
                if let Err(e) = appsrc.end_of_stream() {
                    warn!("Failed to signal end of stream to display: {:?}", e);
                }
                pipeline
                    .set_state(gstreamer::State::Null)
                    .map_err(|e| RenderError::Sink {
                        details: format!("Failed to stop display pipeline: {}", e),
                    })?;
                info!("Display pipeline stopped");
            }
            Ok(())
        }
    }
}
