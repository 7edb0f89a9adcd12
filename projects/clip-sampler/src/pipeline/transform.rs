use crate::pipeline::config::{CropMode, SamplingConfig};
use crate::pipeline::error::TransformError;
use image::{imageops, RgbImage};
use ndarray::Array3;

/// Channel-first `(3, height, width)` normalized frame.
pub type FrameTensor = Array3<f32>;

/// Spatial collaborator: crops and normalizes decoded frames.
///
/// The output holds `frames.len() * num_crop()` tensors in crop-major order:
/// every input frame for crop 0, then every input frame for crop 1, and so on.
pub trait SpatialTransform: Send + Sync {
    fn num_crop(&self) -> usize;
    fn apply(&self, frames: &[RgbImage]) -> Result<Vec<FrameTensor>, TransformError>;
}

/// Per-channel mean/std applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalize {
    pub fn imagenet() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl Default for Normalize {
    fn default() -> Self {
        Self::imagenet()
    }
}

/// A square crop window, optionally mirrored left-to-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub flip: bool,
}

/// Center / three / ten crop followed by to-tensor and normalization.
#[derive(Debug, Clone)]
pub struct CropTransform {
    mode: CropMode,
    size: u32,
    normalize: Normalize,
}

impl CropTransform {
    pub fn new(mode: CropMode, size: u32) -> Self {
        Self {
            mode,
            size,
            normalize: Normalize::imagenet(),
        }
    }

    /// Crop policy and `input_size` of a validated sampling config.
    pub fn from_config(config: &SamplingConfig) -> Result<Self, TransformError> {
        let size = u32::try_from(config.input_size()).map_err(|_| {
            TransformError::CropSizeOutOfRange {
                size: config.input_size(),
            }
        })?;
        Ok(Self::new(config.crop_mode(), size))
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }

    /// Crop windows for a `width x height` frame, in output order.
    pub fn regions(&self, width: u32, height: u32) -> Result<Vec<CropRegion>, TransformError> {
        let size = self.size;
        if width < size || height < size {
            return Err(TransformError::FrameTooSmall {
                width,
                height,
                size,
            });
        }

        let center_x = (width - size) / 2;
        let center_y = (height - size) / 2;
        let at = |x, y| CropRegion { x, y, flip: false };

        let regions = match self.mode {
            CropMode::Center => vec![at(center_x, center_y)],
            CropMode::Three => {
                if width >= height {
                    vec![at(0, center_y), at(center_x, center_y), at(width - size, center_y)]
                } else {
                    vec![at(center_x, 0), at(center_x, center_y), at(center_x, height - size)]
                }
            }
            CropMode::Ten => {
                let corners = [
                    at(0, 0),
                    at(width - size, 0),
                    at(0, height - size),
                    at(width - size, height - size),
                    at(center_x, center_y),
                ];
                corners
                    .iter()
                    .copied()
                    .chain(corners.iter().map(|r| CropRegion { flip: true, ..*r }))
                    .collect()
            }
        };

        Ok(regions)
    }

    fn to_tensor(&self, frame: &RgbImage, region: CropRegion) -> FrameTensor {
        let size = self.size as usize;
        let mut crop = imageops::crop_imm(frame, region.x, region.y, self.size, self.size).to_image();
        if region.flip {
            imageops::flip_horizontal_in_place(&mut crop);
        }

        let Normalize { mean, std } = self.normalize;
        Array3::from_shape_fn((3, size, size), |(c, y, x)| {
            let value = crop.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - mean[c]) / std[c]
        })
    }
}

impl SpatialTransform for CropTransform {
    fn num_crop(&self) -> usize {
        self.mode.num_crop()
    }

    fn apply(&self, frames: &[RgbImage]) -> Result<Vec<FrameTensor>, TransformError> {
        let Some(first) = frames.first() else {
            return Ok(Vec::new());
        };

        let expected = first.dimensions();
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.dimensions() != expected)
        {
            return Err(TransformError::InconsistentFrameSize {
                index,
                expected,
                found: frame.dimensions(),
            });
        }

        let regions = self.regions(expected.0, expected.1)?;
        let mut out = Vec::with_capacity(frames.len() * regions.len());
        for region in regions {
            for frame in frames {
                out.push(self.to_tensor(frame, region));
            }
        }

        Ok(out)
    }
}
