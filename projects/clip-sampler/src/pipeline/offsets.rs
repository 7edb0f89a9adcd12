// Segment placement: where each temporal segment starts inside a video

use crate::pipeline::config::SamplingConfig;
use std::sync::Arc;

/// Produces the per-step jitter added to a segment walk.
///
/// Implementations must return `config.steps_per_segment()` values.
pub trait SkipOffsetStrategy: Send + Sync {
    fn skip_offsets(&self, config: &SamplingConfig, duration: usize) -> Vec<usize>;
}

/// Deterministic strategy: no jitter at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroSkipOffsets;

impl SkipOffsetStrategy for ZeroSkipOffsets {
    fn skip_offsets(&self, config: &SamplingConfig, _duration: usize) -> Vec<usize> {
        vec![0; config.steps_per_segment()]
    }
}

/// Segment start offsets and intra-segment jitter for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    /// 1-based start position of each segment, or all zeros for a degenerate video.
    pub offsets: Vec<usize>,
    pub skip_offsets: Vec<usize>,
    /// True when the video was too short to hold one skip-length window.
    pub degenerate: bool,
}

/// Centers one sampling window inside each of `num_segments` equal bins.
///
/// Returns an empty-window fallback of all zeros when `duration` cannot hold a
/// full `skip_length` window.
pub fn segment_offsets(config: &SamplingConfig, duration: usize) -> Vec<usize> {
    let skip_length = config.skip_length();
    let num_segments = config.num_segments();

    if duration + 1 > skip_length {
        let tick = (duration + 1 - skip_length) as f64 / num_segments as f64;
        (0..num_segments)
            .map(|x| (tick / 2.0 + tick * x as f64) as usize + 1)
            .collect()
    } else {
        vec![0; num_segments]
    }
}

#[derive(Clone)]
pub struct SegmentOffsetCalculator {
    skip_strategy: Arc<dyn SkipOffsetStrategy>,
}

impl Default for SegmentOffsetCalculator {
    fn default() -> Self {
        Self {
            skip_strategy: Arc::new(ZeroSkipOffsets),
        }
    }
}

impl SegmentOffsetCalculator {
    pub fn with_skip_strategy(skip_strategy: Arc<dyn SkipOffsetStrategy>) -> Self {
        Self { skip_strategy }
    }

    pub fn compute(&self, duration: usize, config: &SamplingConfig) -> SegmentPlan {
        let offsets = segment_offsets(config, duration);
        let degenerate = duration + 1 <= config.skip_length();

        let steps = config.steps_per_segment();
        let mut skip_offsets = self.skip_strategy.skip_offsets(config, duration);
        if skip_offsets.len() != steps {
            tracing::warn!(
                "Skip offset strategy returned {} offsets for {} steps, padding/truncating with zeros",
                skip_offsets.len(),
                steps
            );
            skip_offsets.resize(steps, 0);
        }

        SegmentPlan {
            offsets,
            skip_offsets,
            degenerate,
        }
    }
}
