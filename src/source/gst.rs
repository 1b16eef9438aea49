use super::decoder::{DecodeSession, FrameDecoder};
use crate::error::SourceError;
use crate::frame::{FrameData, FrameFormat};

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// Video file decoder built on a GStreamer `decodebin` pipeline
#[derive(Debug, Clone)]
pub struct GstFileDecoder {
    preroll_timeout: Duration,
}

impl GstFileDecoder {
    pub fn new() -> Self {
        Self {
            preroll_timeout: Duration::from_secs(5),
        }
    }

    fn build_pipeline_string(location: &str) -> String {
        format!(
            "filesrc location=\"{}\" ! \
             decodebin ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=4 drop=false",
            location.replace('"', "\\\"")
        )
    }

    fn bus_error(pipeline: &Pipeline) -> Option<String> {
        let bus = pipeline.bus()?;
        let message =
            bus.timed_pop_filtered(gstreamer::ClockTime::ZERO, &[gstreamer::MessageType::Error])?;
        match message.view() {
            gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }
}

impl Default for GstFileDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for GstFileDecoder {
    fn open(&self, source_id: &str) -> Result<Box<dyn DecodeSession>, SourceError> {
        let open_error = |details: String| SourceError::Open {
            source_id: source_id.to_string(),
            details,
        };

        gstreamer::init().map_err(|e| open_error(format!("Failed to initialize GStreamer: {}", e)))?;

        if !Path::new(source_id).is_file() {
            return Err(open_error("file not found".to_string()));
        }

        let pipeline_desc = Self::build_pipeline_string(source_id);
        info!("Creating GStreamer decode pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| open_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| open_error("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_error("Failed to get appsink element".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| open_error("Failed to downcast to AppSink".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|e| open_error(format!("Failed to preroll pipeline: {}", e)))?;

        // Preroll surfaces missing files, unknown containers and decoder errors here
        let timeout = gstreamer::ClockTime::from_mseconds(self.preroll_timeout.as_millis() as u64);
        let (preroll, _, _) = pipeline.state(timeout);
        if preroll.is_err() {
            let details = Self::bus_error(&pipeline).unwrap_or_else(|| "preroll failed".to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(details));
        }

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_error(format!("Failed to start pipeline: {}", e)))?;

        info!("GStreamer decode pipeline playing");
        Ok(Box::new(GstFileSession {
            pipeline,
            appsink,
            produced: 0,
            finished: false,
        }))
    }
}

struct GstFileSession {
    pipeline: Pipeline,
    appsink: AppSink,
    produced: u64,
    finished: bool,
}

impl GstFileSession {
    fn sample_to_frame(&self, sample: &gstreamer::Sample) -> Result<FrameData, SourceError> {
        let buffer = sample.buffer().ok_or_else(|| SourceError::Read {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| SourceError::Read {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| SourceError::Read {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer.map_readable().map_err(|e| SourceError::Read {
            details: format!("Failed to map buffer: {}", e),
        })?;

        // Rows are padded to the stride; keep only the pixel bytes
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let row_data = map.get(start..start + row_bytes).ok_or_else(|| SourceError::Read {
                details: format!("Buffer too small for row {} ({} bytes)", row, map.len()),
            })?;
            data.extend_from_slice(row_data);
        }

        Ok(FrameData::new(
            self.produced + 1,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }
}

impl DecodeSession for GstFileSession {
    fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        if self.finished {
            return Ok(None);
        }

        match self.appsink.pull_sample() {
            Ok(sample) => {
                let frame = self.sample_to_frame(&sample)?;
                self.produced += 1;
                trace!(
                    "Decoded frame {} ({}x{})",
                    frame.id,
                    frame.width,
                    frame.height
                );
                Ok(Some(frame))
            }
            Err(_) if self.appsink.is_eos() => {
                debug!("Decode pipeline reached EOS after {} frame(s)", self.produced);
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                let details = GstFileDecoder::bus_error(&self.pipeline).unwrap_or_else(|| e.to_string());
                Err(SourceError::Read { details })
            }
        }
    }
}

impl Drop for GstFileSession {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer decode pipeline cleanly: {}", e);
        }
    }
}
