use super::region::MotionRegion;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;

use image::{GrayImage, Luma};
use imageproc::{
    contrast::threshold,
    distance_transform::Norm,
    morphology::dilate,
    region_labelling::{connected_components, Connectivity},
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Motion detection collaborator.
///
/// Implementations compare two grayscale frames of identical dimensions and
/// return the regions that changed between them. They must be deterministic
/// and free of side effects; the pipeline calls them from a blocking thread.
pub trait MotionDetector: Send + Sync {
    fn detect(
        &self,
        current: &GrayImage,
        previous: &GrayImage,
    ) -> Result<Vec<MotionRegion>, AnalyzerError>;
}

/// Frame-difference detector: absolute difference, binary threshold,
/// dilation and 8-connected labelling, one bounding box per component
#[derive(Debug, Clone)]
pub struct FrameDiffDetector {
    delta_threshold: u8,
    dilate_iterations: u8,
}

impl FrameDiffDetector {
    pub fn new(delta_threshold: u8, dilate_iterations: u8) -> Self {
        Self {
            delta_threshold,
            dilate_iterations,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(
            config.delta_threshold.min(u8::MAX as u32) as u8,
            config.dilate_iterations.min(u8::MAX as u32) as u8,
        )
    }

    pub fn delta_threshold(&self) -> u8 {
        self.delta_threshold
    }

    /// Calculate frame difference between the retained and current frame
    fn calculate_frame_difference(&self, previous: &GrayImage, current: &GrayImage) -> GrayImage {
        let (width, height) = current.dimensions();
        let mut diff_image = GrayImage::new(width, height);

        for ((diff, curr), prev) in diff_image
            .pixels_mut()
            .zip(current.pixels())
            .zip(previous.pixels())
        {
            *diff = Luma([curr[0].abs_diff(prev[0])]);
        }

        diff_image
    }

    /// Collect the bounding box of every labelled component (label 0 is background)
    fn component_bounds(components: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<MotionRegion> {
        let mut bounds: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();

        for (x, y, pixel) in components.enumerate_pixels() {
            let label = pixel[0];
            if label == 0 {
                continue;
            }
            bounds
                .entry(label)
                .and_modify(|(min_x, min_y, max_x, max_y)| {
                    *min_x = (*min_x).min(x);
                    *min_y = (*min_y).min(y);
                    *max_x = (*max_x).max(x);
                    *max_y = (*max_y).max(y);
                })
                .or_insert((x, y, x, y));
        }

        bounds
            .into_values()
            .map(|(min_x, min_y, max_x, max_y)| MotionRegion::from_bounds(min_x, min_y, max_x, max_y))
            .collect()
    }
}

impl Default for FrameDiffDetector {
    fn default() -> Self {
        Self::new(25, 2)
    }
}

impl MotionDetector for FrameDiffDetector {
    fn detect(
        &self,
        current: &GrayImage,
        previous: &GrayImage,
    ) -> Result<Vec<MotionRegion>, AnalyzerError> {
        if current.dimensions() != previous.dimensions() {
            return Err(AnalyzerError::DimensionMismatch {
                current: current.dimensions(),
                previous: previous.dimensions(),
            });
        }

        let diff_image = self.calculate_frame_difference(previous, current);
        let binary_mask = threshold(&diff_image, self.delta_threshold);

        let cleaned_mask = if self.dilate_iterations > 0 {
            dilate(&binary_mask, Norm::LInf, self.dilate_iterations)
        } else {
            binary_mask
        };

        let components = connected_components(&cleaned_mask, Connectivity::Eight, Luma([0u8]));
        let regions = Self::component_bounds(&components);

        trace!("Region bounds: {:?}", regions);
        debug!(
            "Motion analysis complete: {} region(s) above delta {}",
            regions.len(),
            self.delta_threshold
        );
        Ok(regions)
    }
}
