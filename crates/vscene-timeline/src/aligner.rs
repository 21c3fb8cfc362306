//! Attach transcript dialogue to scenes by time.
//!
//! A segment belongs to a scene only when both its start and end fall inside
//! the scene's closed `[start_time, end_time]` interval. Segments straddling
//! a scene boundary are attached to no scene at all.

use tracing::debug;
use vscene_models::{CombinedScene, Scene, TranscriptSegment};

use crate::representative::representative_caption;

/// Texts of the segments lying entirely within `scene`, in transcript order.
pub fn dialogue_for_scene(scene: &Scene, segments: &[TranscriptSegment]) -> Vec<String> {
    segments
        .iter()
        .filter(|seg| scene.contains_time(seg.start) && scene.contains_time(seg.end))
        .map(|seg| seg.text.clone())
        .collect()
}

/// Pair each scene with its representative description and dialogue.
pub fn combine_scenes_with_transcript(
    scenes: &[Scene],
    segments: &[TranscriptSegment],
) -> Vec<CombinedScene> {
    let combined: Vec<CombinedScene> = scenes
        .iter()
        .map(|scene| CombinedScene {
            start_time: scene.start_time,
            end_time: scene.end_time,
            description: representative_caption(&scene.captions)
                .map(|rep| rep.text)
                .unwrap_or_default(),
            dialogue: dialogue_for_scene(scene, segments),
        })
        .collect();

    let attached: usize = combined.iter().map(|c| c.dialogue.len()).sum();
    debug!(
        scenes = scenes.len(),
        segments = segments.len(),
        attached,
        "Aligned transcript to scenes"
    );
    combined
}
