use crate::error::FrameError;
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Frame format enumeration supporting different video formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// YUV 4:2:2 format - uncompressed YUV data
    Yuyv,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Yuyv => 2,
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single video frame.
///
/// The pixel buffer is owned outright: a frame moves from stage to stage
/// through the pipeline channels and is never shared between two stages.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Position of the frame in the source sequence (1-based)
    pub id: u64,
    /// Timestamp when the frame was produced
    pub timestamp: SystemTime,
    /// Raw frame data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data,
            width,
            height,
            format,
        }
    }

    /// Wrap an RGB image as an `Rgb24` frame
    pub fn from_rgb_image(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(
            id,
            timestamp,
            image.into_raw(),
            width,
            height,
            FrameFormat::Rgb24,
        )
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true, // Compressed formats have variable size
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn check_size(&self) -> Result<(), FrameError> {
        match self.expected_size() {
            Some(expected) if expected != self.data.len() => Err(FrameError::InvalidSize {
                id: self.id,
                expected,
                actual: self.data.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Convert the frame to the grayscale representation used for detection
    pub fn to_gray_image(&self) -> Result<GrayImage, FrameError> {
        self.check_size()?;

        match self.format {
            FrameFormat::Mjpeg => {
                let dynamic_image =
                    image::load_from_memory(&self.data).map_err(|e| FrameError::Decode {
                        details: format!("MJPEG decode failed: {}", e),
                    })?;
                Ok(dynamic_image.to_luma8())
            }
            FrameFormat::Yuyv => Ok(self.yuyv_to_gray()),
            FrameFormat::Rgb24 => {
                let mut gray_image = GrayImage::new(self.width, self.height);
                for (pixel, rgb) in gray_image.pixels_mut().zip(self.data.chunks_exact(3)) {
                    *pixel = Luma([luminance(rgb[0], rgb[1], rgb[2])]);
                }
                Ok(gray_image)
            }
        }
    }

    /// Convert the frame to an RGB image for overlay drawing
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        self.check_size()?;

        match self.format {
            FrameFormat::Mjpeg => {
                let dynamic_image =
                    image::load_from_memory(&self.data).map_err(|e| FrameError::Decode {
                        details: format!("MJPEG decode failed: {}", e),
                    })?;
                Ok(dynamic_image.to_rgb8())
            }
            FrameFormat::Yuyv => Ok(self.yuyv_to_rgb()),
            FrameFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .ok_or_else(|| FrameError::Decode {
                    details: "Failed to create RGB image from raw data".to_string(),
                }),
        }
    }

    // YUYV format: Y0 U Y1 V (4 bytes for 2 pixels)
    fn yuyv_to_gray(&self) -> GrayImage {
        let mut gray_image = GrayImage::new(self.width, self.height);
        for (pixel, y) in gray_image
            .pixels_mut()
            .zip(self.data.iter().step_by(2))
        {
            *pixel = Luma([*y]);
        }
        gray_image
    }

    fn yuyv_to_rgb(&self) -> RgbImage {
        let mut rgb_image = RgbImage::new(self.width, self.height);
        let width = self.width as usize;

        for (index, chunk) in self.data.chunks_exact(4).enumerate() {
            let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
            let first = index * 2;
            for (offset, luma) in [(0usize, y0), (1usize, y1)] {
                let position = first + offset;
                let (x, y) = ((position % width) as u32, (position / width) as u32);
                if x < self.width && y < self.height {
                    rgb_image.put_pixel(x, y, yuv_to_rgb(luma, u, v));
                }
            }
        }

        rgb_image
    }
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let clamp = |value: f32| value.round().clamp(0.0, 255.0) as u8;
    Rgb([
        clamp(y + 1.402 * v),
        clamp(y - 0.344_136 * u - 0.714_136 * v),
        clamp(y + 1.772 * u),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Mjpeg.bytes_per_pixel(), 0);
        assert_eq!(FrameFormat::Yuyv.bytes_per_pixel(), 2);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);

        assert!(FrameFormat::Mjpeg.is_compressed());
        assert!(!FrameFormat::Yuyv.is_compressed());
        assert!(!FrameFormat::Rgb24.is_compressed());
    }

    #[test]
    fn test_frame_size_validation() {
        let valid_frame = FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 64 * 48 * 2],
            64,
            48,
            FrameFormat::Yuyv,
        );
        assert!(valid_frame.validate_size());

        let invalid_frame = FrameData::new(
            2,
            SystemTime::now(),
            vec![0u8; 100],
            64,
            48,
            FrameFormat::Rgb24,
        );
        assert!(!invalid_frame.validate_size());
        assert!(matches!(
            invalid_frame.to_gray_image(),
            Err(FrameError::InvalidSize { id: 2, .. })
        ));

        // MJPEG frame (compressed, always valid)
        let mjpeg_frame = FrameData::new(
            3,
            SystemTime::now(),
            vec![0u8; 5000],
            640,
            480,
            FrameFormat::Mjpeg,
        );
        assert!(mjpeg_frame.validate_size());
    }

    #[test]
    fn test_rgb_to_gray_conversion() {
        let mut data = Vec::new();
        data.extend_from_slice(&[255, 255, 255]);
        data.extend_from_slice(&[0, 0, 0]);
        let frame = FrameData::new(1, SystemTime::now(), data, 2, 1, FrameFormat::Rgb24);

        let gray = frame.to_gray_image().unwrap();
        assert_eq!(gray.dimensions(), (2, 1));
        assert!(gray.get_pixel(0, 0)[0] >= 254);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_yuyv_conversions_use_luma() {
        // Two pixels: Y0=200, U=128, Y1=10, V=128 (neutral chroma)
        let frame = FrameData::new(
            1,
            SystemTime::now(),
            vec![200, 128, 10, 128],
            2,
            1,
            FrameFormat::Yuyv,
        );

        let gray = frame.to_gray_image().unwrap();
        assert_eq!(gray.get_pixel(0, 0)[0], 200);
        assert_eq!(gray.get_pixel(1, 0)[0], 10);

        let rgb = frame.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([200, 200, 200]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 10, 10]));
    }

    #[test]
    fn test_rgb_image_wrapping() {
        let image = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let frame = FrameData::from_rgb_image(7, SystemTime::now(), image);

        assert_eq!(frame.id, 7);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.format, FrameFormat::Rgb24);
        assert!(frame.validate_size());
        assert_eq!(frame.to_rgb_image().unwrap().get_pixel(3, 2), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_corrupt_mjpeg_is_a_decode_error() {
        let frame = FrameData::new(
            1,
            SystemTime::now(),
            vec![0u8; 32],
            8,
            8,
            FrameFormat::Mjpeg,
        );
        assert!(matches!(
            frame.to_gray_image(),
            Err(FrameError::Decode { .. })
        ));
    }
}
