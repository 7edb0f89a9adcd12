// Clip assembly: stack transformed frames into the tensor layout the model expects
//
// Input:  clips * frames_per_clip frames of shape (3, H, W), clip-major.
// Output: (clips, 3, T, H, W), or (clips, 3, H, W) when new_length == 1.

use crate::pipeline::config::SamplingConfig;
use crate::pipeline::error::ShapeMismatchError;
use crate::pipeline::transform::FrameTensor;
use ndarray::{stack, ArrayD, ArrayView3, Axis, IxDyn};

pub const CHANNELS: usize = 3;

/// The assembled numeric array handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipTensor {
    data: ArrayD<f32>,
}

impl ClipTensor {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn batch_size(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[1]
    }

    /// Length of the time axis, or `None` for frame-level (4-D) tensors.
    pub fn time_steps(&self) -> Option<usize> {
        (self.data.ndim() == 5).then(|| self.data.shape()[2])
    }

    pub fn as_array(&self) -> &ArrayD<f32> {
        &self.data
    }
}

/// Stacks, reshapes and transposes `frames` into a [`ClipTensor`].
///
/// Fails fast when the frame count does not match
/// `config.clips_per_video() * config.frames_per_clip()` or when a frame is
/// not `(3, input_size, input_size)`.
pub fn assemble(
    frames: &[FrameTensor],
    config: &SamplingConfig,
) -> Result<ClipTensor, ShapeMismatchError> {
    let clips = config.clips_per_video();
    let per_clip = config.frames_per_clip();
    let size = config.input_size();
    let expected = [CHANNELS, size, size];

    if frames.len() != clips * per_clip {
        return Err(ShapeMismatchError::FrameCount {
            frames: frames.len(),
            clips,
            per_clip,
        });
    }

    if let Some((index, frame)) = frames
        .iter()
        .enumerate()
        .find(|(_, f)| f.shape() != expected)
    {
        return Err(ShapeMismatchError::FrameShape {
            index,
            expected,
            found: frame.shape().to_vec(),
        });
    }

    let views: Vec<ArrayView3<f32>> = frames.iter().map(|f| f.view()).collect();
    let stacked = stack(Axis(0), &views).map_err(|_| ShapeMismatchError::FrameCount {
        frames: frames.len(),
        clips,
        per_clip,
    })?;

    let clip_major = stacked
        .into_shape_with_order(IxDyn(&[clips, per_clip, CHANNELS, size, size]))
        .map_err(|_| ShapeMismatchError::FrameCount {
            frames: frames.len(),
            clips,
            per_clip,
        })?;

    // (clips, T, C, H, W) -> (clips, C, T, H, W)
    let mut data = clip_major
        .permuted_axes(IxDyn(&[0, 2, 1, 3, 4]))
        .as_standard_layout()
        .into_owned();

    if config.new_length() == 1 && data.shape()[2] == 1 {
        data = data.index_axis_move(Axis(2), 0);
    }

    Ok(ClipTensor { data })
}
