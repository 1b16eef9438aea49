use crate::analyzer::MotionRegion;
use crate::config::PresenterConfig;
use crate::error::RenderError;
use crate::frame::FrameData;

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use tracing::trace;

/// Region filtering and drawing applied before a frame reaches the sink
#[derive(Debug, Clone)]
pub struct RegionOverlay {
    min_region_area: u64,
    blur_sigma: Option<f32>,
    outline_color: Rgb<u8>,
    outline_thickness: u32,
}

impl RegionOverlay {
    pub fn new(min_region_area: u64, outline_color: Rgb<u8>, outline_thickness: u32) -> Self {
        Self {
            min_region_area,
            blur_sigma: None,
            outline_color,
            outline_thickness: outline_thickness.max(1),
        }
    }

    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur_sigma = (sigma > 0.0).then_some(sigma);
        self
    }

    pub fn from_config(config: &PresenterConfig) -> Self {
        let overlay = Self::new(
            config.min_region_area as u64,
            Rgb(config.outline_color),
            config.outline_thickness,
        );

        if config.blur_regions {
            overlay.with_blur(config.blur_sigma)
        } else {
            overlay
        }
    }

    pub fn min_region_area(&self) -> u64 {
        self.min_region_area
    }

    /// Clip regions to the frame, then keep those strictly larger than the
    /// minimum area
    pub fn filter_regions(
        &self,
        regions: &[MotionRegion],
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<MotionRegion> {
        regions
            .iter()
            .filter_map(|region| region.clamp_to(frame_width, frame_height))
            .filter(|region| region.area() > self.min_region_area)
            .collect()
    }

    /// Draw `regions` onto a copy of `frame`, returning an `Rgb24` frame
    pub fn render(
        &self,
        frame: &FrameData,
        regions: &[MotionRegion],
    ) -> Result<FrameData, RenderError> {
        let mut image = frame.to_rgb_image().map_err(|e| RenderError::Overlay {
            details: format!("frame {}: {}", frame.id, e),
        })?;

        for region in regions {
            if let Some(sigma) = self.blur_sigma {
                Self::blur_region(&mut image, region, sigma);
            }
            self.outline_region(&mut image, region);
        }

        trace!("Overlay drawn on frame {} ({} region(s))", frame.id, regions.len());
        Ok(FrameData::from_rgb_image(frame.id, frame.timestamp, image))
    }

    fn blur_region(image: &mut RgbImage, region: &MotionRegion, sigma: f32) {
        let patch = imageops::crop_imm(&*image, region.x, region.y, region.width, region.height)
            .to_image();
        let blurred = gaussian_blur_f32(&patch, sigma);
        imageops::replace(image, &blurred, region.x as i64, region.y as i64);
    }

    // Rings are drawn outward from the region edge
    fn outline_region(&self, image: &mut RgbImage, region: &MotionRegion) {
        for offset in 0..self.outline_thickness {
            let rect = Rect::at(
                region.x as i32 - offset as i32,
                region.y as i32 - offset as i32,
            )
            .of_size(region.width + 2 * offset, region.height + 2 * offset);
            draw_hollow_rect_mut(image, rect, self.outline_color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use std::time::SystemTime;

    fn black_frame(width: u32, height: u32) -> FrameData {
        FrameData::new(
            7,
            SystemTime::now(),
            vec![0u8; (width * height * 3) as usize],
            width,
            height,
            FrameFormat::Rgb24,
        )
    }

    #[test]
    fn test_regions_at_or_below_minimum_area_are_dropped() {
        let overlay = RegionOverlay::new(500, Rgb([0, 255, 0]), 1);
        let regions = vec![
            MotionRegion::new(0, 0, 20, 25),  // 500, dropped
            MotionRegion::new(0, 0, 21, 25),  // 525, kept
            MotionRegion::new(10, 10, 5, 5),  // 25, dropped
        ];

        let kept = overlay.filter_regions(&regions, 640, 480);
        assert_eq!(kept, vec![MotionRegion::new(0, 0, 21, 25)]);
    }

    #[test]
    fn test_regions_are_clipped_to_frame() {
        let overlay = RegionOverlay::new(0, Rgb([0, 255, 0]), 1);
        let regions = vec![
            MotionRegion::new(30, 30, 20, 20),
            MotionRegion::new(100, 100, 5, 5),
        ];

        let kept = overlay.filter_regions(&regions, 40, 40);
        assert_eq!(kept, vec![MotionRegion::new(30, 30, 10, 10)]);
    }

    #[test]
    fn test_minimum_area_applies_after_clipping() {
        let overlay = RegionOverlay::new(500, Rgb([0, 255, 0]), 1);
        let regions = vec![
            MotionRegion::new(60, 40, 30, 30), // 900, clipped to 4x8
            MotionRegion::new(0, 0, 30, 30),   // 900, inside the frame
        ];

        let kept = overlay.filter_regions(&regions, 64, 48);
        assert_eq!(kept, vec![MotionRegion::new(0, 0, 30, 30)]);
    }

    #[test]
    fn test_outline_is_drawn_in_configured_color() {
        let overlay = RegionOverlay::new(0, Rgb([0, 255, 0]), 2);
        let frame = black_frame(32, 32);

        let rendered = overlay
            .render(&frame, &[MotionRegion::new(10, 10, 8, 8)])
            .unwrap();
        let image = rendered.to_rgb_image().unwrap();

        assert_eq!(rendered.id, 7);
        assert_eq!(*image.get_pixel(10, 10), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(9, 9), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(8, 8), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(14, 14), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blur_only_touches_region() {
        let overlay = RegionOverlay::new(0, Rgb([255, 0, 0]), 1).with_blur(2.0);
        let mut image = RgbImage::new(32, 32);
        for y in 0..32 {
            for x in (0..32).step_by(2) {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let frame = FrameData::from_rgb_image(1, SystemTime::now(), image.clone());

        let rendered = overlay
            .render(&frame, &[MotionRegion::new(8, 8, 16, 16)])
            .unwrap()
            .to_rgb_image()
            .unwrap();

        // Outside the region the stripes are untouched
        assert_eq!(rendered.get_pixel(2, 2), image.get_pixel(2, 2));
        assert_eq!(rendered.get_pixel(3, 2), image.get_pixel(3, 2));
        // Inside the region the stripes are smoothed towards grey
        let centre = rendered.get_pixel(16, 16)[0];
        assert!(centre > 0 && centre < 255, "centre pixel {}", centre);
    }
}
