//! Scene timeline construction.
//!
//! Pure, synchronous computations over already-collected sequences:
//! - Gestalt text similarity
//! - Single-pass scene segmentation of frame captions
//! - Medoid selection of a representative caption per scene
//! - Closed-interval alignment of transcript segments to scenes
//! - Positional merge of transcript sentences with emotion samples
//!
//! Nothing here holds shared state, so every function is safe to call from
//! any number of concurrent jobs.

pub mod aligner;
pub mod error;
pub mod merger;
pub mod representative;
pub mod segmenter;
pub mod similarity;

pub use aligner::{combine_scenes_with_transcript, dialogue_for_scene};
pub use error::{TimelineError, TimelineResult};
pub use merger::{merge_text_and_emotions, split_sentences, SENTENCE_DELIMITER};
pub use representative::representative_caption;
pub use segmenter::{categorize_scenes, SceneSegmenter, SegmenterConfig};
pub use similarity::{matching_blocks, similarity, MatchBlock};
