// Batch orchestrator: runs every video of a RunContext through the pipeline
//
// Sampling (open, fetch, transform, assemble) and inference are separate
// stages. With prefetch enabled a reader thread samples video N+1 while the
// calling thread classifies video N, connected by a bounded(1) channel.
// A failed video is logged and recorded; it never stops the batch.

use crate::pipeline::classifier::{reduce_scores, Classifier, Prediction};
use crate::pipeline::driver::{SampledClip, SamplingDriver};
use crate::pipeline::error::PipelineError;
use crate::run_artifacts::{save_logits, save_prediction, PredictionRecord};
use crate::run_context::{RunContext, VideoEntry};
use crate::video::SourceOpener;
use anyhow::{anyhow, Result};
use crossbeam::channel;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::thread;

type Sampled = (VideoEntry, Result<SampledClip, PipelineError>);

/// Opens one video and samples its clip tensor.
pub fn sample_video(
    driver: &SamplingDriver,
    opener: &SourceOpener,
    entry: &VideoEntry,
) -> Result<SampledClip, PipelineError> {
    let mut source = opener(&entry.path).map_err(|e| PipelineError::Open {
        video: entry.name.clone(),
        reason: format!("{:#}", e),
    })?;
    driver.sample(&entry.name, source.as_mut())
}

fn classify(
    classifier: &mut dyn Classifier,
    clip: &SampledClip,
    num_classes: usize,
) -> Result<Prediction, PipelineError> {
    classifier
        .predict(&clip.tensor)
        .and_then(|scores| reduce_scores(&scores, num_classes))
        .map_err(|e| PipelineError::Inference {
            video: clip.video.clone(),
            reason: format!("{:#}", e),
        })
}

struct BatchRunner<'a> {
    ctx: &'a RunContext,
    classifier: &'a mut dyn Classifier,
    progress: ProgressBar,
    total: usize,
}

impl BatchRunner<'_> {
    fn finish_video(
        &mut self,
        position: usize,
        entry: &VideoEntry,
        sampled: Result<SampledClip, PipelineError>,
    ) -> PredictionRecord {
        let record = match sampled.and_then(|clip| {
            let prediction = classify(self.classifier, &clip, self.ctx.num_classes)?;
            Ok((clip, prediction))
        }) {
            Ok((clip, prediction)) => {
                tracing::info!(
                    "{:04}/{:04}: {} is predicted to class {}",
                    position,
                    self.total,
                    entry.name,
                    prediction.label
                );
                match self.save_artifacts(entry, &prediction) {
                    Ok(()) => PredictionRecord::success(&entry.name, clip.duration, &prediction),
                    Err(e) => {
                        tracing::error!("{}: failed to save artifacts: {:#}", entry.name, e);
                        PredictionRecord::failure(&entry.name, format!("{:#}", e))
                    }
                }
            }
            Err(e) => {
                tracing::error!("{}", e.describe());
                PredictionRecord::failure(e.video(), e.describe())
            }
        };

        self.progress.inc(1);
        record
    }

    fn save_artifacts(&self, entry: &VideoEntry, prediction: &Prediction) -> Result<()> {
        if self.ctx.save_logits {
            save_logits(&self.ctx.save_dir, &self.ctx.model_name, &entry.name, prediction)?;
        }
        if self.ctx.save_preds {
            save_prediction(&self.ctx.save_dir, &self.ctx.model_name, &entry.name, prediction)?;
        }
        Ok(())
    }
}

/// Runs every video in `ctx` and returns one record per video, in list order.
pub fn run_batch(
    ctx: &RunContext,
    driver: Arc<SamplingDriver>,
    opener: SourceOpener,
    classifier: &mut dyn Classifier,
) -> Result<Vec<PredictionRecord>> {
    let total = ctx.videos.len();
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos ({eta})")?
            .progress_chars("#>-"),
    );

    let mut runner = BatchRunner {
        ctx,
        classifier,
        progress,
        total,
    };
    let mut records = Vec::with_capacity(total);

    if ctx.prefetch {
        let (tx, rx) = channel::bounded::<Sampled>(1);
        let videos = ctx.videos.clone();
        let reader_driver = driver.clone();
        let reader_opener = opener.clone();

        let reader = thread::spawn(move || {
            tracing::debug!("Prefetch reader started");
            for entry in videos {
                let sampled = sample_video(&reader_driver, &reader_opener, &entry);
                if tx.send((entry, sampled)).is_err() {
                    break;
                }
            }
        });

        for (position, (entry, sampled)) in rx.iter().enumerate() {
            records.push(runner.finish_video(position, &entry, sampled));
        }

        reader
            .join()
            .map_err(|_| anyhow!("Prefetch reader thread panicked"))?;
    } else {
        for (position, entry) in ctx.videos.iter().enumerate() {
            let sampled = sample_video(&driver, &opener, entry);
            records.push(runner.finish_video(position, entry, sampled));
        }
    }

    runner.progress.finish_and_clear();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assembler::ClipTensor;
    use crate::pipeline::config::SamplingParams;
    use crate::pipeline::transform::{CropTransform, Normalize};
    use crate::video::synthetic::SyntheticVideo;
    use crate::video::VideoSource;
    use ndarray::{Array2, Axis};
    use std::path::{Path, PathBuf};

    /// Scores every batch entry with the clip's mean red value in column 1
    /// and a constant 0.5 in column 0.
    struct FixedScores {
        num_classes: usize,
        calls: usize,
    }

    impl Classifier for FixedScores {
        fn predict(&mut self, clip: &ClipTensor) -> Result<Array2<f32>> {
            self.calls += 1;
            let batch = clip.batch_size();
            let mean = clip.as_array().index_axis(Axis(1), 0).mean().unwrap_or(0.0);
            Ok(Array2::from_shape_fn((batch, self.num_classes), |(_, c)| {
                match c {
                    0 => 0.5,
                    1 => mean,
                    _ => 0.0,
                }
            }))
        }
    }

    fn entry(name: &str) -> VideoEntry {
        VideoEntry {
            name: name.to_string(),
            path: PathBuf::from(name),
        }
    }

    /// Durations keyed by file stem: "v100.mp4" has 100 frames, "v0.mp4" none.
    /// Names starting with "missing" fail to open.
    fn synthetic_opener() -> SourceOpener {
        Arc::new(|path: &Path| {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if stem.starts_with("missing") {
                return Err(anyhow!("Video file not found: {}", path.display()));
            }
            let duration: usize = stem.trim_start_matches('v').parse()?;
            Ok(Box::new(SyntheticVideo::new(duration, 4, 4)) as Box<dyn VideoSource>)
        })
    }

    fn context(save_dir: &Path, names: &[&str], prefetch: bool) -> RunContext {
        RunContext {
            videos: names.iter().map(|n| entry(n)).collect(),
            save_dir: save_dir.to_path_buf(),
            model_path: PathBuf::from("fake.onnx"),
            model_name: "fake".to_string(),
            num_classes: 3,
            threads: 1,
            new_width: 4,
            new_height: 4,
            params: SamplingParams {
                new_length: 8,
                input_size: 4,
                ..Default::default()
            },
            save_logits: true,
            save_preds: true,
            prefetch,
        }
    }

    fn driver(ctx: &RunContext) -> Arc<SamplingDriver> {
        let config = ctx.params.clone().validate().unwrap();
        let transform = CropTransform::new(config.crop_mode(), 4).with_normalize(Normalize {
            mean: [0.0; 3],
            std: [1.0 / 255.0; 3],
        });
        Arc::new(SamplingDriver::new(config, Box::new(transform)).unwrap())
    }

    fn run(prefetch: bool) -> (tempfile::TempDir, Vec<PredictionRecord>, usize) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            dir.path(),
            &["v100.mp4", "v0.mp4", "missing.mp4", "v3.mp4"],
            prefetch,
        );
        let mut classifier = FixedScores {
            num_classes: 3,
            calls: 0,
        };
        let records = run_batch(&ctx, driver(&ctx), synthetic_opener(), &mut classifier).unwrap();
        (dir, records, classifier.calls)
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let (dir, records, calls) = run(false);
        assert_eq!(records.len(), 4);
        assert_eq!(calls, 2);

        // v100: frames 46..=53 have red values above 0.5
        assert_eq!(records[0].label, Some(1));
        assert_eq!(records[0].duration, Some(100));

        assert!(records[1].error.as_deref().unwrap().contains("no decodable frames"));
        assert!(records[2].error.as_deref().unwrap().contains("Video file not found"));

        // v3 is shorter than new_length and degrades to frames 0 and 1
        assert!(records[3].is_success());

        assert!(dir.path().join("fake_v100.mp4_logits.npy").exists());
        assert!(dir.path().join("fake_v100.mp4_preds.npy").exists());
        assert!(!dir.path().join("fake_v0.mp4_preds.npy").exists());
    }

    #[test]
    fn test_prefetch_matches_sequential() {
        let (_seq_dir, sequential, _) = run(false);
        let (_pre_dir, prefetched, calls) = run(true);
        assert_eq!(calls, 2);
        assert_eq!(sequential, prefetched);
    }

    #[test]
    fn test_class_count_mismatch_is_per_video() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), &["v50.mp4", "v60.mp4"], false);
        let mut classifier = FixedScores {
            num_classes: 5,
            calls: 0,
        };
        let records = run_batch(&ctx, driver(&ctx), synthetic_opener(), &mut classifier).unwrap();
        assert_eq!(classifier.calls, 2);
        assert!(records.iter().all(|r| r
            .error
            .as_deref()
            .unwrap()
            .contains("expected 3")));
    }
}
