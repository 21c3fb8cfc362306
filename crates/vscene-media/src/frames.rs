//! Frame sampling.
//!
//! Two access patterns are needed: a fixed-rate image sequence for
//! captioning, and single frames at arbitrary timestamps for emotion
//! sampling. Both write JPEGs to a caller-owned directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Native rate assumed when the container reports none.
pub const DEFAULT_SOURCE_FPS: f64 = 30.0;

/// Longest side of frames handed to the emotion classifier.
pub const EMOTION_FRAME_MAX_SIDE: u32 = 800;

const SEQUENCE_PREFIX: &str = "frame_";

/// One decoded frame on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Position in the sampled sequence
    pub index: usize,
    /// Timestamp in seconds
    pub time: f64,
    pub path: PathBuf,
}

/// Keep every n-th native frame so that roughly `target_fps` survive.
///
/// `n = max(1, floor(source_fps / target_fps))`, with non-positive source
/// rates replaced by [`DEFAULT_SOURCE_FPS`].
pub fn frame_interval(source_fps: Option<f64>, target_fps: f64) -> u64 {
    let source = source_fps
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(DEFAULT_SOURCE_FPS);
    let n = (source / target_fps).floor();
    if n.is_finite() && n >= 1.0 {
        n as u64
    } else {
        1
    }
}

/// Timestamps `0, rate, 2*rate, ...` strictly below `duration`.
pub fn sample_times(duration: f64, rate: f64) -> Vec<f64> {
    if !(duration.is_finite() && rate.is_finite()) || duration <= 0.0 || rate <= 0.0 {
        return Vec::new();
    }
    let count = (duration / rate).ceil() as usize;
    (0..count).map(|k| k as f64 * rate).collect()
}

fn select_filter(interval: u64) -> String {
    format!("select='not(mod(n\\,{interval}))'")
}

fn downscale_filter(max_side: u32) -> String {
    format!(
        "scale=w='min({max_side},iw)':h='min({max_side},ih)':force_original_aspect_ratio=decrease"
    )
}

/// Decode every `frame_interval`-th frame of `video` into `out_dir`.
///
/// Frame `i` of the result is stamped `i / fps` seconds.
pub async fn sample_frames(
    video: impl AsRef<Path>,
    fps: f64,
    out_dir: impl AsRef<Path>,
) -> MediaResult<Vec<Frame>> {
    let video = video.as_ref();
    let out_dir = out_dir.as_ref();

    if !fps.is_finite() || fps <= 0.0 {
        return Err(MediaError::InvalidRate(fps));
    }

    let info = probe_video(video).await?;
    let interval = frame_interval(info.fps, fps);
    fs::create_dir_all(out_dir).await?;

    info!(
        "Sampling frames from {} (source fps {:?}, keeping every {} frames)",
        video.display(),
        info.fps,
        interval
    );

    let cmd = FfmpegCommand::new(video, out_dir.join(format!("{SEQUENCE_PREFIX}%06d.jpg")))
        .video_filter(select_filter(interval))
        .variable_frame_rate()
        .jpeg_quality(2)
        .no_audio();
    FfmpegRunner::new().run(&cmd).await?;

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SEQUENCE_PREFIX) && n.ends_with(".jpg"));
        if is_frame {
            paths.push(path);
        }
    }
    // Zero-padded names sort in decode order.
    paths.sort();

    debug!("Sampled {} frames", paths.len());

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| Frame {
            index,
            time: index as f64 / fps,
            path,
        })
        .collect())
}

/// Decode the frame at `time` into `out_dir`, downscaled for classification.
pub async fn grab_frame(
    video: impl AsRef<Path>,
    index: usize,
    time: f64,
    out_dir: impl AsRef<Path>,
) -> MediaResult<Frame> {
    let video = video.as_ref();
    let out_dir = out_dir.as_ref();

    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    fs::create_dir_all(out_dir).await?;

    let path = out_dir.join(format!("sample_{index:06}.jpg"));
    let cmd = FfmpegCommand::new(video, &path)
        .seek(time)
        .single_frame()
        .video_filter(downscale_filter(EMOTION_FRAME_MAX_SIDE))
        .jpeg_quality(2)
        .no_audio();
    FfmpegRunner::new().run(&cmd).await?;

    // FFmpeg exits cleanly without writing anything when seeking past the end.
    if !fs::try_exists(&path).await? {
        return Err(MediaError::NoFrameAt(time));
    }

    Ok(Frame { index, time, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(Some(30.0), 1.0), 30);
        assert_eq!(frame_interval(Some(29.97), 1.0), 29);
        assert_eq!(frame_interval(Some(24.0), 2.0), 12);
        assert_eq!(frame_interval(Some(10.0), 30.0), 1);
        assert_eq!(frame_interval(None, 1.0), 30);
        assert_eq!(frame_interval(Some(0.0), 1.0), 30);
    }

    #[test]
    fn test_sample_times() {
        assert_eq!(sample_times(3.0, 1.0), vec![0.0, 1.0, 2.0]);
        assert_eq!(sample_times(3.5, 1.0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(sample_times(1.0, 0.5), vec![0.0, 0.5]);
        assert!(sample_times(0.0, 1.0).is_empty());
        assert!(sample_times(5.0, 0.0).is_empty());
    }

    #[test]
    fn test_filters() {
        assert_eq!(select_filter(30), "select='not(mod(n\\,30))'");
        assert!(downscale_filter(800).contains("min(800,iw)"));
        assert!(downscale_filter(800).contains("force_original_aspect_ratio=decrease"));
    }

    #[tokio::test]
    async fn test_sample_frames_rejects_bad_rate() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_frames(dir.path().join("clip.mp4"), 0.0, dir.path()).await;
        assert!(matches!(result, Err(MediaError::InvalidRate(_))));
    }

    #[tokio::test]
    async fn test_grab_frame_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let result = grab_frame(dir.path().join("missing.mp4"), 0, 0.0, dir.path()).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_sample_frames_from_generated_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("test.mp4");
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=3:size=320x240:rate=10"])
            .arg(&video)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        let frames = sample_frames(&video, 1.0, dir.path().join("frames")).await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].time, 2.0);

        let grabbed = grab_frame(&video, 0, 1.0, dir.path().join("emotion")).await.unwrap();
        assert!(grabbed.path.exists());

        let past_end = grab_frame(&video, 1, 60.0, dir.path().join("emotion")).await;
        assert!(past_end.is_err());
    }
}
