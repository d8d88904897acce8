// Data structures for camera frames

use serde::{Deserialize, Serialize};

/// A single video frame handed to the keypoint detector
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel layout of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

impl VideoFrame {
    /// Frame data length matches its dimensions and format
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Convert to an RGB image, dropping alpha
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        match self.format {
            PixelFormat::Rgb8 => image::RgbImage::from_raw(self.width, self.height, self.data.clone()),
            PixelFormat::Rgba8 => {
                let rgba = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())?;
                Some(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
            }
        }
    }
}
