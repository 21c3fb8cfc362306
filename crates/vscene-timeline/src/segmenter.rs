//! Single-pass scene segmentation over frame captions.
//!
//! The open scene keeps an anchor: the caption that opened it. A new caption
//! joins the scene when it is close enough to either its predecessor or the
//! anchor. The anchor never moves while the scene is open, which bounds drift
//! to the threshold distance from the scene's origin. Up to `max_gap`
//! consecutive dissimilar captions are absorbed as outliers before the scene
//! is closed.

use tracing::debug;
use vscene_models::Scene;

use crate::error::{TimelineError, TimelineResult};
use crate::similarity::similarity;

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// Minimum similarity for a caption to continue the open scene
    pub threshold: f64,
    /// Consecutive outliers tolerated before splitting
    pub max_gap: u32,
    /// Caption sampling rate, used to turn indices into seconds
    pub fps: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            max_gap: 1,
            fps: 1.0,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> TimelineResult<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(TimelineError::invalid_config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(TimelineError::invalid_config(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        Ok(())
    }
}

/// Scene under construction.
struct OpenScene<'a> {
    start_index: usize,
    members: Vec<&'a str>,
    anchor: &'a str,
    gap_count: u32,
}

impl<'a> OpenScene<'a> {
    fn start(index: usize, caption: &'a str) -> Self {
        Self {
            start_index: index,
            members: vec![caption],
            anchor: caption,
            gap_count: 0,
        }
    }

    fn close(self, fps: f64) -> Scene {
        let end_index = self.start_index + self.members.len();
        Scene {
            captions: self.members.into_iter().map(str::to_string).collect(),
            start_time: self.start_index as f64 / fps,
            end_time: end_index as f64 / fps,
            start_index: self.start_index,
            end_index,
        }
    }
}

/// Validated segmenter.
#[derive(Debug, Clone)]
pub struct SceneSegmenter {
    config: SegmenterConfig,
}

impl SceneSegmenter {
    pub fn new(config: SegmenterConfig) -> TimelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Partition `captions` into contiguous scenes.
    ///
    /// Returns no scenes for empty input and at least one otherwise. The
    /// scenes' index ranges are ascending, non-overlapping and cover
    /// `[0, captions.len())` exactly.
    pub fn segment<S: AsRef<str>>(&self, captions: &[S]) -> Vec<Scene> {
        let Some(first) = captions.first() else {
            return Vec::new();
        };
        let SegmenterConfig {
            threshold,
            max_gap,
            fps,
        } = self.config;

        let mut scenes = Vec::new();
        let mut open = OpenScene::start(0, first.as_ref());

        for (i, pair) in captions.windows(2).enumerate() {
            let (prev, curr) = (pair[0].as_ref(), pair[1].as_ref());
            let index = i + 1;

            let sim_prev = similarity(curr, prev);
            let sim_anchor = similarity(curr, open.anchor);

            if sim_prev.max(sim_anchor) >= threshold {
                open.members.push(curr);
                open.gap_count = 0;
            } else if open.gap_count < max_gap {
                open.members.push(curr);
                open.gap_count += 1;
            } else {
                let closed = std::mem::replace(&mut open, OpenScene::start(index, curr));
                scenes.push(closed.close(fps));
            }
        }
        scenes.push(open.close(fps));

        debug!(
            captions = captions.len(),
            scenes = scenes.len(),
            threshold,
            max_gap,
            "Segmented captions into scenes"
        );
        scenes
    }
}

/// Validate `config` and segment `captions` in one call.
pub fn categorize_scenes<S: AsRef<str>>(
    captions: &[S],
    config: SegmenterConfig,
) -> TimelineResult<Vec<Scene>> {
    Ok(SceneSegmenter::new(config)?.segment(captions))
}
