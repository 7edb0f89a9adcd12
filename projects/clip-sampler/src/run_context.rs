use crate::cli::Args;
use crate::pipeline::config::SamplingParams;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mkv", "mov", "webm"];

/// A video to classify: the identifier used in logs and artifacts, and where
/// to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Everything a batch run needs, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub videos: Vec<VideoEntry>,
    pub save_dir: PathBuf,
    pub model_path: PathBuf,
    pub model_name: String,
    pub num_classes: usize,
    pub threads: usize,
    pub new_width: u32,
    pub new_height: u32,
    pub params: SamplingParams,
    pub save_logits: bool,
    pub save_preds: bool,
    pub prefetch: bool,
}

impl RunContext {
    pub fn from_args(args: &Args) -> Result<Self> {
        fs::create_dir_all(&args.save_dir)
            .with_context(|| format!("Failed to create save dir {}", args.save_dir.display()))?;

        let videos = match &args.data_list {
            Some(list) => {
                let content = fs::read_to_string(list)
                    .with_context(|| format!("Failed to read data list {}", list.display()))?;
                let root = args.need_root.then_some(args.data_dir.as_path());
                parse_data_list(&content, root)
            }
            None => list_videos(&args.data_dir),
        };

        if videos.is_empty() {
            bail!("No videos to process (data dir {})", args.data_dir.display());
        }

        let model_name = match &args.model_name {
            Some(name) => name.clone(),
            None => args
                .model
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid model path: {}", args.model.display()))?
                .to_string(),
        };

        Ok(Self {
            videos,
            save_dir: args.save_dir.clone(),
            model_path: args.model.clone(),
            model_name,
            num_classes: args.num_classes,
            threads: args.threads,
            new_width: args.new_width,
            new_height: args.new_height,
            params: args.sampling_params(),
            save_logits: args.save_logits,
            save_preds: args.save_preds,
            prefetch: args.prefetch,
        })
    }
}

/// Every video file under `data_dir`, sorted by path. Names are relative to
/// `data_dir`.
pub fn list_videos(data_dir: &Path) -> Vec<VideoEntry> {
    let mut videos: Vec<VideoEntry> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| VIDEO_EXTENSIONS.contains(&s.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| {
            let path = e.path().to_path_buf();
            let name = path
                .strip_prefix(data_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            VideoEntry { name, path }
        })
        .collect();

    videos.sort_by(|a, b| a.path.cmp(&b.path));
    videos
}

/// Parses an annotation list: the first whitespace-separated token of each
/// non-empty line names a video. With `root`, paths are joined onto it.
pub fn parse_data_list(content: &str, root: Option<&Path>) -> Vec<VideoEntry> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| {
            let path = match root {
                Some(root) => root.join(name),
                None => PathBuf::from(name),
            };
            VideoEntry {
                name: name.to_string(),
                path,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_data_list() {
        let content = "abseiling/a.mp4 120 0\n\n  bowling/b.mp4 300 31\n";
        let entries = parse_data_list(content, Some(Path::new("/data/k400")));
        assert_eq!(
            entries,
            vec![
                VideoEntry {
                    name: "abseiling/a.mp4".to_string(),
                    path: PathBuf::from("/data/k400/abseiling/a.mp4"),
                },
                VideoEntry {
                    name: "bowling/b.mp4".to_string(),
                    path: PathBuf::from("/data/k400/bowling/b.mp4"),
                },
            ]
        );

        let bare = parse_data_list("/abs/c.avi\n", None);
        assert_eq!(bare[0].path, PathBuf::from("/abs/c.avi"));
    }

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/two.MP4"), b"").unwrap();
        fs::write(dir.path().join("one.avi"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let names: Vec<String> = list_videos(dir.path()).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["b/two.MP4".to_string(), "one.avi".to_string()]);
    }

    #[test]
    fn test_from_args() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("val.txt");
        fs::write(&list, "clip.mp4 10 1\n").unwrap();
        let save_dir = dir.path().join("out");

        let args = Args::try_parse_from([
            "clip-sampler",
            "--model",
            "/models/slowfast_4x16.onnx",
            "--data-dir",
            "/videos",
            "--need-root",
            "--data-list",
            list.to_str().unwrap(),
            "--save-dir",
            save_dir.to_str().unwrap(),
        ])
        .unwrap();

        let ctx = RunContext::from_args(&args).unwrap();
        assert!(save_dir.is_dir());
        assert_eq!(ctx.model_name, "slowfast_4x16");
        assert_eq!(ctx.videos[0].path, PathBuf::from("/videos/clip.mp4"));
    }

    #[test]
    fn test_empty_video_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "clip-sampler",
            "--model",
            "m.onnx",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--save-dir",
            dir.path().join("out").to_str().unwrap(),
        ])
        .unwrap();
        assert!(RunContext::from_args(&args).is_err());
    }
}
