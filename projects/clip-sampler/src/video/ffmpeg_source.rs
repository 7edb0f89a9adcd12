use super::{SourceOpener, VideoSource};
use crate::pipeline::error::FrameReadError;
use anyhow::{anyhow, Context, Result};
use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::Video as VideoFrame;
use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Video source backed by FFmpeg via ffmpeg-next.
///
/// Frames are scaled to `width x height` RGB24 as they are decoded. A fetch
/// sorts the requested indices and serves them from one forward decode pass,
/// rewinding to the start only when a request goes backwards.
pub struct FfmpegVideoSource {
    path: PathBuf,
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    /// Lazily created on first frame (source format is only known then).
    scaler: Option<scaling::Context>,
    width: u32,
    height: u32,
    total_frames: usize,
    frames_decoded: usize,
    /// Persistent packet object to avoid allocations.
    reuse_packet: ffmpeg_next::codec::packet::Packet,
    /// Whether we've sent EOF to the decoder.
    eof_sent: bool,
}

// SAFETY: a source is opened and consumed on a single thread (the main thread or
// the prefetch reader). The raw pointers inside ffmpeg-next types are never shared.
unsafe impl Send for FfmpegVideoSource {}

impl FfmpegVideoSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }

        let mut input_ctx =
            ffmpeg_next::format::input(&path).context("Failed to open video file")?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;

        let video_stream_index = video_stream.index();

        let rational_fps = video_stream.avg_frame_rate();
        let source_fps = if rational_fps.denominator() > 0 {
            rational_fps.numerator() as f64 / rational_fps.denominator() as f64
        } else {
            tracing::warn!("FfmpegVideoSource: could not determine FPS, defaulting to 30.0");
            30.0
        };

        let stream_frames = video_stream.frames().max(0) as usize;
        let duration_secs = input_ctx.duration().max(0) as f64 / ffi::AV_TIME_BASE as f64;
        let metadata_frames = if stream_frames == 0 {
            (duration_secs * source_fps).round() as usize
        } else {
            stream_frames
        };

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .context("Failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        let counted_frames = count_packets(&mut input_ctx, video_stream_index)?;
        let total_frames = reconcile_frame_count(counted_frames, metadata_frames);
        if counted_frames > 0 && counted_frames != metadata_frames {
            tracing::warn!(
                "FfmpegVideoSource: {} has {} video packets but metadata reports {} frames",
                path.display(),
                counted_frames,
                metadata_frames
            );
        }

        tracing::debug!(
            "FfmpegVideoSource: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}, total={}",
            path.display(),
            duration_secs,
            source_fps,
            stream_frames,
            total_frames
        );

        Ok(Self {
            path: path.to_path_buf(),
            input_ctx,
            decoder,
            video_stream_index,
            scaler: None,
            width,
            height,
            total_frames,
            frames_decoded: 0,
            reuse_packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }

    /// Opener producing FFmpeg sources that decode at `width x height`.
    pub fn opener(width: u32, height: u32) -> SourceOpener {
        Arc::new(move |path: &Path| {
            let source = FfmpegVideoSource::open(path, width, height)?;
            Ok(Box::new(source) as Box<dyn VideoSource>)
        })
    }

    /// Decode the next frame of the video stream into `target`.
    fn decode_next(&mut self, target: &mut VideoFrame) -> Result<(), String> {
        loop {
            if self.decoder.receive_frame(target).is_ok() {
                return Ok(());
            }
            if self.eof_sent {
                return Err("End of stream".to_string());
            }

            // Feed packets until we find a video packet OR reach EOF
            let mut found_packet = false;
            while self.reuse_packet.read(&mut self.input_ctx).is_ok() {
                if self.reuse_packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.reuse_packet)
                        .map_err(|e| format!("Failed to send packet to decoder: {}", e))?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                self.decoder
                    .send_eof()
                    .map_err(|e| format!("Failed to send EOF to decoder: {}", e))?;
                self.eof_sent = true;
            }
        }
    }

    fn rewind(&mut self) -> Result<(), String> {
        self.input_ctx
            .seek(0, ..0)
            .map_err(|e| format!("Failed to seek to start of {}: {}", self.path.display(), e))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.frames_decoded = 0;
        Ok(())
    }

    /// Scale/convert a decoded frame to an owned RGB image.
    fn to_rgb(&mut self, frame: &VideoFrame) -> Result<RgbImage, String> {
        if self.scaler.is_none() {
            let scaler = scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                Pixel::RGB24,
                self.width,
                self.height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| format!("Failed to create scaler: {}", e))?;
            self.scaler = Some(scaler);
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| "Scaler unavailable".to_string())?;

        let mut rgb = VideoFrame::empty();
        scaler
            .run(frame, &mut rgb)
            .map_err(|e| format!("Scaler failed: {}", e))?;
        rgb_frame_to_image(&rgb)
    }
}

/// Counts the packets of one stream in a single demux pass, then seeks back
/// to the start. Every video packet carries exactly one frame.
fn count_packets(
    input_ctx: &mut ffmpeg_next::format::context::Input,
    stream_index: usize,
) -> Result<usize> {
    let count = input_ctx
        .packets()
        .filter(|(stream, _)| stream.index() == stream_index)
        .count();
    input_ctx
        .seek(0, ..0)
        .context("Failed to seek back to start after counting frames")?;
    Ok(count)
}

/// The demuxed packet count wins; metadata is only used when nothing was counted.
fn reconcile_frame_count(counted: usize, metadata: usize) -> usize {
    if counted > 0 {
        counted
    } else {
        metadata
    }
}

/// Copy an RGB24 ffmpeg frame into an owned image, dropping row padding.
fn rgb_frame_to_image(frame: &VideoFrame) -> Result<RgbImage, String> {
    let width = frame.width();
    let height = frame.height();
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;

    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let src_offset = y * stride;
        buffer.extend_from_slice(&data[src_offset..src_offset + row_bytes]);
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| format!("Failed to build {}x{} RGB image", width, height))
}

impl VideoSource for FfmpegVideoSource {
    fn duration(&self) -> usize {
        self.total_frames
    }

    fn fetch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, FrameReadError> {
        let mut targets = indices.to_vec();
        targets.sort_unstable();
        targets.dedup();

        if let Some(&first) = targets.first() {
            if first < self.frames_decoded {
                self.rewind()
                    .map_err(|reason| FrameReadError { index: first, reason })?;
            }
        }

        let mut decoded: HashMap<usize, RgbImage> = HashMap::with_capacity(targets.len());
        let mut frame = VideoFrame::empty();

        for &target in &targets {
            while self.frames_decoded < target {
                self.decode_next(&mut frame)
                    .map_err(|reason| FrameReadError { index: target, reason })?;
                self.frames_decoded += 1;
            }

            self.decode_next(&mut frame)
                .map_err(|reason| FrameReadError { index: target, reason })?;
            self.frames_decoded += 1;

            let image = self
                .to_rgb(&frame)
                .map_err(|reason| FrameReadError { index: target, reason })?;
            decoded.insert(target, image);
        }

        indices
            .iter()
            .map(|index| {
                decoded.get(index).cloned().ok_or_else(|| FrameReadError {
                    index: *index,
                    reason: "Frame was not decoded".to_string(),
                })
            })
            .collect()
    }
}
