// Error taxonomy for the sampling pipeline
//
// ConfigError is fatal for the whole run. Everything wrapped by PipelineError
// is fatal for a single video only: the orchestrator logs it and moves on.

use thiserror::Error;

/// Invalid sampling configuration, detected once when the config is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive integer")]
    NonPositive { field: &'static str },

    #[error(
        "slow_temporal_stride ({slow}) must be a positive multiple of fast_temporal_stride ({fast})"
    )]
    StridesNotNested { slow: usize, fast: usize },

    #[error("new_length ({new_length}) is shorter than slow_temporal_stride ({slow}), the slow pathway would be empty")]
    EmptySlowPathway { new_length: usize, slow: usize },

    #[error("dual-rate sampling needs new_length > 1, frame-level clips have no time axis to split")]
    SingleFrameDualRate,

    #[error("spatial transform produces {transform} crops but the sampling config expects {config}")]
    CropCountMismatch { transform: usize, config: usize },
}

/// Raised by a video source when a requested frame cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("frame {index} could not be decoded: {reason}")]
pub struct FrameReadError {
    pub index: usize,
    pub reason: String,
}

/// The assembler received frames that cannot form the expected clip tensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeMismatchError {
    #[error("got {frames} frames, expected {clips} clips x {per_clip} frames per clip")]
    FrameCount {
        frames: usize,
        clips: usize,
        per_clip: usize,
    },

    #[error("frame {index} has shape {found:?}, expected {expected:?}")]
    FrameShape {
        index: usize,
        expected: [usize; 3],
        found: Vec<usize>,
    },
}

/// Spatial transform precondition violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("crop size {size} does not fit in a u32 image dimension")]
    CropSizeOutOfRange { size: usize },

    #[error("frame {width}x{height} is smaller than the {size}x{size} crop")]
    FrameTooSmall { width: u32, height: u32, size: u32 },

    #[error("frame {index} is {found:?}, the clip started with {expected:?}")]
    InconsistentFrameSize {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Per-video failure. Every variant names the video it belongs to.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open video {video}: {reason}")]
    Open { video: String, reason: String },

    #[error("video {video} has no decodable frames")]
    EmptyVideo { video: String },

    #[error("error occurred in reading frames {indices:?} from video {video} of duration {duration}")]
    FrameRead {
        video: String,
        duration: usize,
        indices: Vec<usize>,
        #[source]
        source: FrameReadError,
    },

    #[error("spatial transform failed for video {video}")]
    Transform {
        video: String,
        #[source]
        source: TransformError,
    },

    #[error("clip assembly failed for video {video} of duration {duration}")]
    ShapeMismatch {
        video: String,
        duration: usize,
        #[source]
        source: ShapeMismatchError,
    },

    #[error("inference failed for video {video}: {reason}")]
    Inference { video: String, reason: String },
}

impl PipelineError {
    pub fn video(&self) -> &str {
        match self {
            PipelineError::Open { video, .. }
            | PipelineError::EmptyVideo { video }
            | PipelineError::FrameRead { video, .. }
            | PipelineError::Transform { video, .. }
            | PipelineError::ShapeMismatch { video, .. }
            | PipelineError::Inference { video, .. } => video,
        }
    }

    /// Display of the error followed by its source chain, `: `-separated.
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_includes_indices_and_cause() {
        let err = PipelineError::FrameRead {
            video: "abseiling.mp4".to_string(),
            duration: 12,
            indices: vec![3, 4, 5],
            source: FrameReadError {
                index: 5,
                reason: "End of stream".to_string(),
            },
        };

        let text = err.describe();
        assert!(text.contains("[3, 4, 5]"));
        assert!(text.contains("abseiling.mp4"));
        assert!(text.contains("duration 12"));
        assert!(text.ends_with("frame 5 could not be decoded: End of stream"));
        assert_eq!(err.video(), "abseiling.mp4");
    }

    #[test]
    fn test_describe_without_source() {
        let err = PipelineError::EmptyVideo {
            video: "empty.mp4".to_string(),
        };
        assert_eq!(err.describe(), "video empty.mp4 has no decodable frames");
    }
}
