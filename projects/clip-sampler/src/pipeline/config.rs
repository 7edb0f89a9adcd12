use crate::pipeline::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Spatial crop policy applied to every sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Single center crop
    #[default]
    Center,
    /// Three squares along the longer side
    Three,
    /// Four corners + center, plus their horizontal flips
    Ten,
}

impl CropMode {
    pub fn num_crop(self) -> usize {
        match self {
            CropMode::Center => 1,
            CropMode::Three => 3,
            CropMode::Ten => 10,
        }
    }
}

/// Raw, unvalidated sampling parameters as they come from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub num_segments: usize,
    pub new_length: usize,
    pub new_step: usize,
    pub slowfast: bool,
    pub slow_temporal_stride: usize,
    pub fast_temporal_stride: usize,
    pub input_size: usize,
    pub crop_mode: CropMode,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            num_segments: 1,
            new_length: 32,
            new_step: 1,
            slowfast: false,
            slow_temporal_stride: 16,
            fast_temporal_stride: 2,
            input_size: 224,
            crop_mode: CropMode::Center,
        }
    }
}

impl SamplingParams {
    pub fn validate(self) -> Result<SamplingConfig, ConfigError> {
        SamplingConfig::try_from(self)
    }
}

/// Validated, immutable sampling configuration.
///
/// The only way to obtain one is through [`SamplingParams::validate`], so every
/// holder can rely on `num_segments`, `new_length`, `new_step` and `input_size`
/// being positive, and on the slow stride being a multiple of the fast stride
/// when dual-rate sampling is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    params: SamplingParams,
}

impl TryFrom<SamplingParams> for SamplingConfig {
    type Error = ConfigError;

    fn try_from(params: SamplingParams) -> Result<Self, Self::Error> {
        let positive = [
            ("num_segments", params.num_segments),
            ("new_length", params.new_length),
            ("new_step", params.new_step),
            ("input_size", params.input_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }

        if params.slowfast {
            if params.new_length == 1 {
                return Err(ConfigError::SingleFrameDualRate);
            }
            let slow = params.slow_temporal_stride;
            let fast = params.fast_temporal_stride;
            if fast == 0 || slow == 0 || slow % fast != 0 {
                return Err(ConfigError::StridesNotNested { slow, fast });
            }
            if params.new_length < slow {
                return Err(ConfigError::EmptySlowPathway {
                    new_length: params.new_length,
                    slow,
                });
            }
        }

        Ok(Self { params })
    }
}

impl SamplingConfig {
    pub fn num_segments(&self) -> usize {
        self.params.num_segments
    }

    pub fn new_length(&self) -> usize {
        self.params.new_length
    }

    pub fn new_step(&self) -> usize {
        self.params.new_step
    }

    pub fn slowfast(&self) -> bool {
        self.params.slowfast
    }

    pub fn slow_temporal_stride(&self) -> usize {
        self.params.slow_temporal_stride
    }

    pub fn fast_temporal_stride(&self) -> usize {
        self.params.fast_temporal_stride
    }

    pub fn input_size(&self) -> usize {
        self.params.input_size
    }

    pub fn crop_mode(&self) -> CropMode {
        self.params.crop_mode
    }

    pub fn num_crop(&self) -> usize {
        self.params.crop_mode.num_crop()
    }

    /// Total frame span walked by one segment: `new_length * new_step`.
    pub fn skip_length(&self) -> usize {
        self.params.new_length * self.params.new_step
    }

    /// Number of steps in one segment walk (`skip_length / new_step`).
    pub fn steps_per_segment(&self) -> usize {
        self.skip_length() / self.params.new_step
    }

    /// Fast-pathway frames contributed by one segment in dual-rate mode.
    pub fn fast_per_segment(&self) -> usize {
        self.steps_per_segment() / self.params.fast_temporal_stride
    }

    /// Slow-pathway frames contributed by one segment in dual-rate mode.
    pub fn slow_per_segment(&self) -> usize {
        self.steps_per_segment() / self.params.slow_temporal_stride
    }

    /// Frames per segment after index resolution.
    pub fn frames_per_clip(&self) -> usize {
        if self.params.slowfast {
            self.fast_per_segment() + self.slow_per_segment()
        } else {
            self.steps_per_segment()
        }
    }

    /// Batch size of the assembled clip tensor.
    pub fn clips_per_video(&self) -> usize {
        self.params.num_segments * self.num_crop()
    }
}
