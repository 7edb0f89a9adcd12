// In-memory video source used by the pipeline tests

use super::VideoSource;
use crate::pipeline::error::FrameReadError;
use image::{Rgb, RgbImage};
use std::sync::{Arc, Mutex};

/// Solid-color frames whose red channel is `index % 256` and green channel is
/// `index / 256`, so tests can recover which frame ended up where.
pub struct SyntheticVideo {
    pub duration: usize,
    pub width: u32,
    pub height: u32,
    /// Frames at or beyond this index fail to decode.
    pub readable_until: Option<usize>,
    /// Every index list passed to `fetch`.
    pub requests: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl SyntheticVideo {
    pub fn new(duration: usize, width: u32, height: u32) -> Self {
        Self {
            duration,
            width,
            height,
            readable_until: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn frame(&self, index: usize) -> RgbImage {
        RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([(index % 256) as u8, (index / 256) as u8, 0]),
        )
    }
}

/// Inverse of the frame encoding, given the red and green channel values.
pub fn decode_index(red: u8, green: u8) -> usize {
    green as usize * 256 + red as usize
}

impl VideoSource for SyntheticVideo {
    fn duration(&self) -> usize {
        self.duration
    }

    fn fetch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, FrameReadError> {
        self.requests.lock().unwrap().push(indices.to_vec());

        let limit = self.readable_until.unwrap_or(self.duration);
        indices
            .iter()
            .map(|&index| {
                if index >= limit {
                    Err(FrameReadError {
                        index,
                        reason: "End of stream".to_string(),
                    })
                } else {
                    Ok(self.frame(index))
                }
            })
            .collect()
    }
}
