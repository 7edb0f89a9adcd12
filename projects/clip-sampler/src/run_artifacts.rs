// Run artifact definitions and writers
//
// Per-video score/label dumps (.npy) and the per-run summary
// (predictions.json + predictions.csv) written into save_dir.

use crate::pipeline::classifier::Prediction;
use crate::pipeline::config::SamplingParams;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ndarray::{arr0, Axis};
use ndarray_npy::write_npy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SUMMARY_JSON: &str = "predictions.json";
pub const SUMMARY_CSV: &str = "predictions.csv";

/// Outcome for one video. Exactly one of `label` / `error` is set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub video: String,
    #[serde(default)]
    pub duration: Option<usize>,
    #[serde(default)]
    pub label: Option<usize>,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PredictionRecord {
    pub fn success(video: &str, duration: usize, prediction: &Prediction) -> Self {
        Self {
            video: video.to_string(),
            duration: Some(duration),
            label: Some(prediction.label),
            score: prediction.scores.get(prediction.label).copied(),
            error: None,
        }
    }

    pub fn failure(video: &str, error: String) -> Self {
        Self {
            video: video.to_string(),
            duration: None,
            label: None,
            score: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Row of predictions.csv.
#[derive(Serialize, Debug)]
struct CsvRow<'a> {
    video: &'a str,
    duration: usize,
    label: usize,
    score: f32,
}

/// Contents of predictions.json.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub model_name: String,
    pub num_classes: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub params: SamplingParams,
    pub succeeded: usize,
    pub failed: usize,
    pub records: Vec<PredictionRecord>,
}

impl RunSummary {
    pub fn new(
        model_name: &str,
        num_classes: usize,
        started_at: DateTime<Utc>,
        params: SamplingParams,
        records: Vec<PredictionRecord>,
    ) -> Self {
        let succeeded = records.iter().filter(|r| r.is_success()).count();
        Self {
            model_name: model_name.to_string(),
            num_classes,
            started_at,
            finished_at: Utc::now(),
            params,
            succeeded,
            failed: records.len() - succeeded,
            records,
        }
    }
}

/// Name used for a video's artifacts: the full identifier, extension
/// included, with path separators flattened to `_` so that same-named files
/// in different directories stay distinct.
pub fn artifact_name(video: &str) -> String {
    video
        .trim_start_matches(['/', '\\'])
        .replace(['/', '\\'], "_")
}

/// Writes the batch-averaged scores to `<model>_<video>_logits.npy` as a
/// `(1, num_classes)` array, the layout of a single network output row.
pub fn save_logits(
    save_dir: &Path,
    model_name: &str,
    video: &str,
    prediction: &Prediction,
) -> Result<PathBuf> {
    let path = save_dir.join(format!("{}_{}_logits.npy", model_name, artifact_name(video)));
    write_npy(&path, &prediction.scores.view().insert_axis(Axis(0)))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes the label as a 0-d int64 array to `<model>_<video>_preds.npy`.
pub fn save_prediction(
    save_dir: &Path,
    model_name: &str,
    video: &str,
    prediction: &Prediction,
) -> Result<PathBuf> {
    let path = save_dir.join(format!("{}_{}_preds.npy", model_name, artifact_name(video)));
    write_npy(&path, &arr0(prediction.label as i64))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn write_summary(save_dir: &Path, summary: &RunSummary) -> Result<()> {
    let json_path = save_dir.join(SUMMARY_JSON);
    let content = serde_json::to_string_pretty(summary)?;
    fs::write(&json_path, content)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let csv_path = save_dir.join(SUMMARY_CSV);
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    for record in &summary.records {
        if let (Some(duration), Some(label), Some(score)) =
            (record.duration, record.label, record.score)
        {
            writer.serialize(CsvRow {
                video: &record.video,
                duration,
                label,
                score,
            })?;
        }
    }
    writer.flush()?;

    tracing::info!(
        "Wrote {} and {} to {}",
        SUMMARY_JSON,
        SUMMARY_CSV,
        save_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array0, Array2};
    use ndarray_npy::read_npy;

    fn prediction() -> Prediction {
        Prediction {
            scores: array![0.1, 0.7, 0.2],
            label: 1,
        }
    }

    #[test]
    fn test_npy_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let logits = save_logits(dir.path(), "i3d", "clips/abseiling_001.mp4", &prediction()).unwrap();
        let preds =
            save_prediction(dir.path(), "i3d", "clips/abseiling_001.mp4", &prediction()).unwrap();

        assert_eq!(logits, dir.path().join("i3d_clips_abseiling_001.mp4_logits.npy"));
        assert_eq!(preds, dir.path().join("i3d_clips_abseiling_001.mp4_preds.npy"));

        let scores: Array2<f32> = read_npy(&logits).unwrap();
        assert_eq!(scores, array![[0.1, 0.7, 0.2]]);
        let label: Array0<i64> = read_npy(&preds).unwrap();
        assert_eq!(label.into_scalar(), 1);
    }

    #[test]
    fn test_summary_files() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            PredictionRecord::success("a.mp4", 100, &prediction()),
            PredictionRecord::failure("b.mp4", "video b.mp4 has no decodable frames".to_string()),
        ];
        let summary = RunSummary::new("i3d", 3, Utc::now(), SamplingParams::default(), records);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        write_summary(dir.path(), &summary).unwrap();

        let json = fs::read_to_string(dir.path().join(SUMMARY_JSON)).unwrap();
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.records, summary.records);
        assert_eq!(parsed.params, SamplingParams::default());

        let csv = fs::read_to_string(dir.path().join(SUMMARY_CSV)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["video,duration,label,score", "a.mp4,100,1,0.7"]);
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("dir/sub/clip.avi"), "dir_sub_clip.avi");
        assert_eq!(artifact_name("/abs/clip.mp4"), "abs_clip.mp4");
        assert_eq!(artifact_name("noext"), "noext");
    }

    #[test]
    fn test_same_stem_videos_get_distinct_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let first = Prediction {
            scores: array![0.9, 0.1],
            label: 0,
        };
        let second = Prediction {
            scores: array![0.2, 0.8],
            label: 1,
        };

        let paths = [
            save_logits(dir.path(), "m", "abseiling/x.mp4", &first).unwrap(),
            save_logits(dir.path(), "m", "bowling/x.mp4", &second).unwrap(),
            save_logits(dir.path(), "m", "x.avi", &second).unwrap(),
        ];
        assert_eq!(paths[0], dir.path().join("m_abseiling_x.mp4_logits.npy"));
        assert_eq!(paths[1], dir.path().join("m_bowling_x.mp4_logits.npy"));
        assert_eq!(paths[2], dir.path().join("m_x.avi_logits.npy"));

        let kept: Array2<f32> = read_npy(&paths[0]).unwrap();
        assert_eq!(kept, array![[0.9, 0.1]]);

        let preds = [
            save_prediction(dir.path(), "m", "abseiling/x.mp4", &first).unwrap(),
            save_prediction(dir.path(), "m", "bowling/x.mp4", &second).unwrap(),
        ];
        let label: Array0<i64> = read_npy(&preds[0]).unwrap();
        assert_eq!(label.into_scalar(), 0);
        let label: Array0<i64> = read_npy(&preds[1]).unwrap();
        assert_eq!(label.into_scalar(), 1);
    }
}
