// Frame index resolution: turns a segment plan into absolute 0-based frame ids
//
// Both sampling regimes share one stepper (`walk_segments`); they differ only
// in which steps they keep and in what order, which is the `StepCollector`'s job.

use crate::pipeline::config::SamplingConfig;
use crate::pipeline::offsets::SegmentPlan;

/// Ordered 0-based frame indices handed to the video source.
pub type FrameIndexList = Vec<usize>;

/// Receives every step of every segment walk, in order.
pub trait StepCollector {
    fn begin_segment(&mut self) {}
    /// `step` is the 0-based position of the step inside its segment.
    fn collect(&mut self, step: usize, frame_id: usize);
    fn end_segment(&mut self) {}
    fn finish(self) -> FrameIndexList;
}

/// Walks `skip_length` frames per segment in `new_step` increments.
///
/// The candidate frame at step `i` is `offset + skip[i] - 1` while
/// `offset + skip[i] <= duration`, otherwise it falls back to the segment's
/// current `offset - 1`. Zero offsets (degenerate videos) clamp to frame 0.
/// The offset only advances while `offset + new_step < duration`.
pub fn walk_segments<C: StepCollector>(
    config: &SamplingConfig,
    duration: usize,
    plan: &SegmentPlan,
    collector: &mut C,
) {
    let new_step = config.new_step();
    let steps = config.steps_per_segment();

    for &segment_start in &plan.offsets {
        collector.begin_segment();
        let mut offset = segment_start;

        for step in 0..steps {
            let jitter = plan.skip_offsets.get(step).copied().unwrap_or(0);
            let frame_id = if offset + jitter <= duration {
                (offset + jitter).saturating_sub(1)
            } else {
                offset.saturating_sub(1)
            };
            collector.collect(step, frame_id);

            if offset + new_step < duration {
                offset += new_step;
            }
        }

        collector.end_segment();
    }
}

/// Keeps every step: segment-major, then step order.
#[derive(Debug, Default)]
pub struct CollectAll {
    ids: FrameIndexList,
}

impl StepCollector for CollectAll {
    fn collect(&mut self, _step: usize, frame_id: usize) {
        self.ids.push(frame_id);
    }

    fn finish(self) -> FrameIndexList {
        self.ids
    }
}

/// Buckets steps into fast and slow pathways.
///
/// A step whose 1-based position is a multiple of the fast stride joins the
/// fast list; if it is also a multiple of the slow stride it joins the slow
/// list as well. Each segment emits its fast list followed by its slow list.
#[derive(Debug)]
pub struct StrideBuckets {
    fast_stride: usize,
    slow_stride: usize,
    fast: Vec<usize>,
    slow: Vec<usize>,
    ids: FrameIndexList,
}

impl StrideBuckets {
    pub fn new(fast_stride: usize, slow_stride: usize) -> Self {
        Self {
            fast_stride,
            slow_stride,
            fast: Vec::new(),
            slow: Vec::new(),
            ids: Vec::new(),
        }
    }
}

impl StepCollector for StrideBuckets {
    fn begin_segment(&mut self) {
        self.fast.clear();
        self.slow.clear();
    }

    fn collect(&mut self, step: usize, frame_id: usize) {
        let position = step + 1;
        if position % self.fast_stride == 0 {
            self.fast.push(frame_id);

            if position % self.slow_stride == 0 {
                self.slow.push(frame_id);
            }
        }
    }

    fn end_segment(&mut self) {
        self.ids.append(&mut self.fast);
        self.ids.append(&mut self.slow);
    }

    fn finish(self) -> FrameIndexList {
        self.ids
    }
}

/// Uniform (TSN-style) resolution.
pub fn resolve_uniform(config: &SamplingConfig, duration: usize, plan: &SegmentPlan) -> FrameIndexList {
    let mut collector = CollectAll::default();
    walk_segments(config, duration, plan, &mut collector);
    collector.finish()
}

/// Dual-rate (SlowFast-style) resolution.
pub fn resolve_dual_rate(
    config: &SamplingConfig,
    duration: usize,
    plan: &SegmentPlan,
) -> FrameIndexList {
    let mut collector =
        StrideBuckets::new(config.fast_temporal_stride(), config.slow_temporal_stride());
    walk_segments(config, duration, plan, &mut collector);
    collector.finish()
}

/// Picks the resolver matching `config.slowfast()`.
pub fn resolve(config: &SamplingConfig, duration: usize, plan: &SegmentPlan) -> FrameIndexList {
    if config.slowfast() {
        resolve_dual_rate(config, duration, plan)
    } else {
        resolve_uniform(config, duration, plan)
    }
}
