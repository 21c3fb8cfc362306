//! FFmpeg CLI wrapper for video frame work.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeouts
//! - FFprobe-based video inspection
//! - Fixed-rate frame sampling for captioning
//! - Single-frame grabs at arbitrary timestamps for emotion sampling

pub mod command;
pub mod error;
pub mod frames;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    frame_interval, grab_frame, sample_frames, sample_times, Frame, DEFAULT_SOURCE_FPS,
    EMOTION_FRAME_MAX_SIDE,
};
pub use probe::{get_duration, probe_video, VideoInfo};
