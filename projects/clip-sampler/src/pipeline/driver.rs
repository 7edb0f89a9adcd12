// SamplingDriver: one straight-line pipeline per video
//
// duration -> segment plan -> frame indices -> fetch -> transform -> assemble

use crate::pipeline::assembler::{assemble, ClipTensor};
use crate::pipeline::config::SamplingConfig;
use crate::pipeline::error::{ConfigError, PipelineError};
use crate::pipeline::indices::{resolve, FrameIndexList};
use crate::pipeline::offsets::{SegmentOffsetCalculator, SegmentPlan, SkipOffsetStrategy};
use crate::pipeline::transform::SpatialTransform;
use crate::video::VideoSource;
use std::sync::Arc;

/// Everything produced for one video, ready for inference.
#[derive(Debug, Clone)]
pub struct SampledClip {
    pub video: String,
    pub duration: usize,
    pub indices: FrameIndexList,
    pub tensor: ClipTensor,
}

/// Owns the immutable sampling configuration and the spatial transform.
///
/// Holds no per-video state, so one driver can be shared across threads.
pub struct SamplingDriver {
    config: SamplingConfig,
    offsets: SegmentOffsetCalculator,
    transform: Box<dyn SpatialTransform>,
}

impl SamplingDriver {
    pub fn new(
        config: SamplingConfig,
        transform: Box<dyn SpatialTransform>,
    ) -> Result<Self, ConfigError> {
        if transform.num_crop() != config.num_crop() {
            return Err(ConfigError::CropCountMismatch {
                transform: transform.num_crop(),
                config: config.num_crop(),
            });
        }

        Ok(Self {
            config,
            offsets: SegmentOffsetCalculator::default(),
            transform,
        })
    }

    pub fn with_skip_strategy(mut self, strategy: Arc<dyn SkipOffsetStrategy>) -> Self {
        self.offsets = SegmentOffsetCalculator::with_skip_strategy(strategy);
        self
    }

    /// Segment plan and resolved frame indices for a video of `duration` frames.
    pub fn frame_indices(&self, duration: usize) -> (SegmentPlan, FrameIndexList) {
        let plan = self.offsets.compute(duration, &self.config);
        let indices = resolve(&self.config, duration, &plan);
        (plan, indices)
    }

    pub fn sample(
        &self,
        video: &str,
        source: &mut dyn VideoSource,
    ) -> Result<SampledClip, PipelineError> {
        let duration = source.duration();
        if duration == 0 {
            return Err(PipelineError::EmptyVideo {
                video: video.to_string(),
            });
        }

        let (plan, indices) = self.frame_indices(duration);
        if plan.degenerate {
            tracing::warn!(
                "{}: duration {} is shorter than skip length {}, sampling from frame 0",
                video,
                duration,
                self.config.skip_length()
            );
        }
        tracing::debug!("{}: segment offsets {:?}", video, plan.offsets);

        let frames = source
            .fetch(&indices)
            .map_err(|source| PipelineError::FrameRead {
                video: video.to_string(),
                duration,
                indices: indices.clone(),
                source,
            })?;

        let transformed =
            self.transform
                .apply(&frames)
                .map_err(|source| PipelineError::Transform {
                    video: video.to_string(),
                    source,
                })?;

        let tensor =
            assemble(&transformed, &self.config).map_err(|source| PipelineError::ShapeMismatch {
                video: video.to_string(),
                duration,
                source,
            })?;

        Ok(SampledClip {
            video: video.to_string(),
            duration,
            indices,
            tensor,
        })
    }
}
