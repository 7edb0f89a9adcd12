use crate::pipeline::config::{CropMode, SamplingParams};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Sample fixed-length clips from videos and classify them with an ONNX model.
#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Root directory for video files
    #[arg(long, env = "CLIP_SAMPLER_DATA_DIR", default_value = "")]
    pub data_dir: PathBuf,

    /// Join every entry of --data-list onto --data-dir
    #[arg(long)]
    pub need_root: bool,

    /// Annotation file; the first token of each non-empty line is a video path.
    /// When omitted, --data-dir is scanned for video files.
    #[arg(long)]
    pub data_list: Option<PathBuf>,

    /// ONNX action-recognition model
    #[arg(long, env = "CLIP_SAMPLER_MODEL")]
    pub model: PathBuf,

    /// Name used in artifact file names (defaults to the model file stem)
    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long, default_value_t = 400)]
    pub num_classes: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Side of the square crop fed to the model
    #[arg(long, default_value_t = 224)]
    pub input_size: usize,

    /// Height frames are resized to when decoded
    #[arg(long, default_value_t = 256)]
    pub new_height: u32,

    /// Width frames are resized to when decoded
    #[arg(long, default_value_t = 340)]
    pub new_width: u32,

    /// Frames per clip
    #[arg(long, default_value_t = 32)]
    pub new_length: usize,

    /// Temporal stride between sampled frames
    #[arg(long, default_value_t = 1)]
    pub new_step: usize,

    /// Clips sampled per video
    #[arg(long, default_value_t = 1)]
    pub num_segments: usize,

    #[arg(long, conflicts_with = "three_crop")]
    pub ten_crop: bool,

    #[arg(long)]
    pub three_crop: bool,

    /// Sample fast and slow pathways (SlowFast models)
    #[arg(long)]
    pub slowfast: bool,

    #[arg(long, default_value_t = 16)]
    pub slow_temporal_stride: usize,

    #[arg(long, default_value_t = 2)]
    pub fast_temporal_stride: usize,

    /// Directory for predictions, artifacts and the log file
    #[arg(long, env = "CLIP_SAMPLER_SAVE_DIR", default_value = "./predictions")]
    pub save_dir: PathBuf,

    #[arg(long, default_value = "predictions.log")]
    pub logging_file: String,

    /// Save the averaged class scores of every video
    #[arg(long)]
    pub save_logits: bool,

    /// Save the predicted label of every video
    #[arg(long)]
    pub save_preds: bool,

    /// Decode the next video while the current one is classified
    #[arg(long)]
    pub prefetch: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn crop_mode(&self) -> CropMode {
        if self.ten_crop {
            CropMode::Ten
        } else if self.three_crop {
            CropMode::Three
        } else {
            CropMode::Center
        }
    }

    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            num_segments: self.num_segments,
            new_length: self.new_length,
            new_step: self.new_step,
            slowfast: self.slowfast,
            slow_temporal_stride: self.slow_temporal_stride,
            fast_temporal_stride: self.fast_temporal_stride,
            input_size: self.input_size,
            crop_mode: self.crop_mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["clip-sampler", "--model", "i3d.onnx"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.num_classes, 400);
        assert_eq!((args.new_width, args.new_height), (340, 256));
        assert_eq!(args.crop_mode(), CropMode::Center);
        assert_eq!(args.logging_file, "predictions.log");

        let params = args.sampling_params();
        assert_eq!(params.new_length, 32);
        assert_eq!(params.input_size, 224);
        assert!(!params.slowfast);
    }

    #[test]
    fn test_crop_flags() {
        assert_eq!(parse(&["--ten-crop"]).unwrap().crop_mode(), CropMode::Ten);
        assert_eq!(
            parse(&["--three-crop"]).unwrap().sampling_params().crop_mode,
            CropMode::Three
        );
        assert!(parse(&["--ten-crop", "--three-crop"]).is_err());
    }

    #[test]
    fn test_slowfast_flags() {
        let params = parse(&["--slowfast", "--new-length", "64", "--slow-temporal-stride", "8"])
            .unwrap()
            .sampling_params();
        assert!(params.slowfast);
        assert_eq!(params.new_length, 64);
        assert_eq!(params.slow_temporal_stride, 8);
        assert_eq!(params.fast_temporal_stride, 2);
    }
}
