pub mod ffmpeg_source;
#[cfg(test)]
pub mod synthetic;

use crate::pipeline::error::FrameReadError;
use anyhow::Result;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;

/// Random-access frame provider for one video.
pub trait VideoSource: Send {
    /// Decoded frame count.
    fn duration(&self) -> usize;

    /// Returns one RGB frame per requested index, in request order.
    /// Indices may repeat and need not be sorted.
    fn fetch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, FrameReadError>;
}

/// Opens a [`VideoSource`] for a path. Shared between the main thread and the
/// prefetch reader, each call produces an independent source.
pub type SourceOpener = Arc<dyn Fn(&Path) -> Result<Box<dyn VideoSource>> + Send + Sync>;
