use crate::pipeline::assembler::ClipTensor;
use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array1, Array2, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Maps a clip tensor to one score row per batch entry: `(batch, num_classes)`.
pub trait Classifier {
    fn predict(&mut self, clip: &ClipTensor) -> Result<Array2<f32>>;
}

/// Batch-averaged class scores and the winning label for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub scores: Array1<f32>,
    pub label: usize,
}

/// Averages the per-clip scores over the batch axis and picks the arg-max.
///
/// Ties go to the lowest class index.
pub fn reduce_scores(batch: &Array2<f32>, num_classes: usize) -> Result<Prediction> {
    let (rows, cols) = batch.dim();
    if rows == 0 {
        bail!("classifier returned no score rows");
    }
    if cols != num_classes {
        bail!(
            "classifier returned {} classes, expected {}",
            cols,
            num_classes
        );
    }

    let scores = batch
        .mean_axis(Axis(0))
        .ok_or_else(|| anyhow!("classifier returned no score rows"))?;

    let mut label = 0;
    for (class, &score) in scores.iter().enumerate() {
        if score > scores[label] {
            label = class;
        }
    }

    Ok(Prediction { scores, label })
}

/// Action-recognition model exported to ONNX, run through onnxruntime.
///
/// The model takes the clip tensor as its only input and returns
/// `(batch, num_classes)` logits.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    pub fn new(model_path: &Path, num_threads: usize) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {}", model_path.display()))?;

        tracing::info!(
            "Loaded ONNX model {} ({} threads)",
            model_path.display(),
            num_threads
        );
        Ok(Self { session })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&mut self, clip: &ClipTensor) -> Result<Array2<f32>> {
        let data = clip.as_array().iter().copied().collect::<Vec<f32>>();
        let tensor = match clip.shape() {
            &[n, c, h, w] => Tensor::from_array(([n, c, h, w], data)),
            &[n, c, t, h, w] => Tensor::from_array(([n, c, t, h, w], data)),
            other => bail!("unsupported clip tensor rank {}", other.len()),
        }
        .context("Failed to create clip tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("ONNX inference failed")?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract logits")?;

        logits
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|e| anyhow!("expected (batch, classes) logits: {}", e))
    }
}
