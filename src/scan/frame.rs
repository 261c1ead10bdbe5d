use image::GrayImage;
use image::imageops::{self, FilterType};

/// A single greyscale camera frame, rows tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Frame {
    /// Returns `None` when `luma` does not hold exactly `width * height` bytes.
    pub fn from_luma(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        if luma.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self { width, height, luma })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.luma.get(y * self.width as usize + x).copied().unwrap_or(0)
    }

    /// Shrinks the frame so its longest side is at most `max_dimension`,
    /// keeping the aspect ratio. Smaller frames are returned unchanged.
    pub fn downscale(self, max_dimension: u32) -> Frame {
        let longest = self.width.max(self.height);
        if max_dimension == 0 || longest <= max_dimension {
            return self;
        }

        let scale = max_dimension as f64 / longest as f64;
        let width = ((self.width as f64 * scale).round() as u32).max(1);
        let height = ((self.height as f64 * scale).round() as u32).max(1);

        let Some(image) = GrayImage::from_raw(self.width, self.height, self.luma.clone()) else {
            return self;
        };
        let resized = imageops::resize(&image, width, height, FilterType::Triangle);
        Frame {
            width,
            height,
            luma: resized.into_raw(),
        }
    }
}

impl From<GrayImage> for Frame {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Frame {
            width,
            height,
            luma: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_buffers_of_the_wrong_size() {
        assert!(Frame::from_luma(4, 4, vec![0; 15]).is_none());
    }

    #[test]
    fn downscale_bounds_the_longest_side() {
        let frame = Frame::from_luma(1280, 720, vec![128; 1280 * 720]).unwrap();

        let small = frame.downscale(640);

        assert_eq!((small.width(), small.height()), (640, 360));
        assert_eq!(small.luma().len(), 640 * 360);
    }

    #[test]
    fn small_frames_are_left_alone() {
        let frame = Frame::from_luma(320, 240, vec![0; 320 * 240]).unwrap();
        assert_eq!(frame.clone().downscale(640), frame);
    }
}
