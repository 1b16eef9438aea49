//! In-process stand-ins for the decode, detection and render collaborators.
//!
//! Used by the test suite and the synthetic demo to drive a full session
//! without media files, codecs or a display.

use crate::analyzer::{MotionDetector, MotionRegion};
use crate::error::{AnalyzerError, RenderError, SourceError};
use crate::frame::FrameData;
use crate::presenter::RenderSink;
use crate::source::{DecodeSession, FrameDecoder};

use image::{GrayImage, Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Decoder producing a white square sliding across a black background
#[derive(Debug, Clone)]
pub struct SyntheticDecoder {
    frame_count: u64,
    width: u32,
    height: u32,
    square_size: u32,
    step: u32,
    fail_after: Option<u64>,
}

impl SyntheticDecoder {
    pub fn new(frame_count: u64) -> Self {
        Self {
            frame_count,
            width: 64,
            height: 48,
            square_size: 8,
            step: 4,
            fail_after: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_square(mut self, square_size: u32, step: u32) -> Self {
        self.square_size = square_size;
        self.step = step;
        self
    }

    /// Fail with a read error once `frames` frames have been produced
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn open(&self, source_id: &str) -> Result<Box<dyn DecodeSession>, SourceError> {
        debug!("Opening synthetic source '{}'", source_id);
        Ok(Box::new(SyntheticSession {
            config: self.clone(),
            produced: 0,
        }))
    }
}

struct SyntheticSession {
    config: SyntheticDecoder,
    produced: u64,
}

impl SyntheticSession {
    fn render(&self, index: u64) -> RgbImage {
        let SyntheticDecoder {
            width,
            height,
            square_size,
            step,
            ..
        } = self.config;

        let mut image = RgbImage::new(width, height);
        let travel = width.saturating_sub(square_size).max(1) as u64;
        let x0 = ((index * step as u64) % travel) as u32;
        let y0 = height.saturating_sub(square_size) / 2;

        for y in y0..(y0 + square_size).min(height) {
            for x in x0..(x0 + square_size).min(width) {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        image
    }
}

impl DecodeSession for SyntheticSession {
    fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        if self.config.fail_after == Some(self.produced) {
            return Err(SourceError::Read {
                details: format!("synthetic failure after {} frame(s)", self.produced),
            });
        }

        if self.produced >= self.config.frame_count {
            return Ok(None);
        }

        let image = self.render(self.produced);
        self.produced += 1;
        Ok(Some(FrameData::from_rgb_image(
            self.produced,
            SystemTime::now(),
            image,
        )))
    }
}

/// Decoder whose `open` always fails
#[derive(Debug, Clone, Default)]
pub struct FailingDecoder;

impl FrameDecoder for FailingDecoder {
    fn open(&self, source_id: &str) -> Result<Box<dyn DecodeSession>, SourceError> {
        Err(SourceError::Open {
            source_id: source_id.to_string(),
            details: "source unavailable".to_string(),
        })
    }
}

/// Detector returning the same regions for every call, counting calls
#[derive(Debug, Default)]
pub struct FixedRegionDetector {
    regions: Vec<MotionRegion>,
    fail_after: Option<u64>,
    calls: AtomicU64,
}

impl FixedRegionDetector {
    pub fn new(regions: Vec<MotionRegion>) -> Self {
        Self {
            regions,
            ..Default::default()
        }
    }

    /// Fail every call after the first `calls` successful ones
    pub fn failing_after(mut self, calls: u64) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MotionDetector for FixedRegionDetector {
    fn detect(
        &self,
        current: &GrayImage,
        previous: &GrayImage,
    ) -> Result<Vec<MotionRegion>, AnalyzerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if current.dimensions() != previous.dimensions() {
            return Err(AnalyzerError::DimensionMismatch {
                current: current.dimensions(),
                previous: previous.dimensions(),
            });
        }

        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(AnalyzerError::Detection {
                details: format!("detector failure on call {}", call + 1),
            });
        }

        Ok(self.regions.clone())
    }
}

/// What a [`RecordingSink`] saw for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedFrame {
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<MotionRegion>,
}

/// Read access to the frames captured by a [`RecordingSink`]
#[derive(Debug, Clone, Default)]
pub struct RecordingHandle {
    presented: Arc<Mutex<Vec<PresentedFrame>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingHandle {
    pub fn presented(&self) -> Vec<PresentedFrame> {
        self.presented.lock().clone()
    }

    pub fn frame_ids(&self) -> Vec<u64> {
        self.presented.lock().iter().map(|p| p.frame_id).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Sink recording every presented frame in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    handle: RecordingHandle,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> RecordingHandle {
        self.handle.clone()
    }
}

impl RenderSink for RecordingSink {
    fn present(&mut self, frame: &FrameData, regions: &[MotionRegion]) -> Result<(), RenderError> {
        self.handle.presented.lock().push(PresentedFrame {
            frame_id: frame.id,
            width: frame.width,
            height: frame.height,
            regions: regions.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), RenderError> {
        self.handle.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink failing once it has presented `fail_after` frames
#[derive(Debug, Default)]
pub struct FailingSink {
    fail_after: u64,
    presented: u64,
}

impl FailingSink {
    pub fn new(fail_after: u64) -> Self {
        Self {
            fail_after,
            presented: 0,
        }
    }
}

impl RenderSink for FailingSink {
    fn present(&mut self, frame: &FrameData, _regions: &[MotionRegion]) -> Result<(), RenderError> {
        if self.presented >= self.fail_after {
            return Err(RenderError::Sink {
                details: format!("sink rejected frame {}", frame.id),
            });
        }
        self.presented += 1;
        Ok(())
    }
}
