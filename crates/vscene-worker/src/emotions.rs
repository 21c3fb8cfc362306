//! Emotion sampling at a fixed time step.

use std::path::Path;

use tracing::{debug, warn};
use vscene_media::sample_times;
use vscene_models::EmotionSample;

use crate::collaborators::{EmotionClassifier, FrameSampler};
use crate::error::WorkerResult;
use crate::metrics;

/// Classify one frame every `sample_rate` seconds over the whole video.
///
/// Exactly one sample is produced per requested time. A classification
/// failure is kept as a degraded sample; failing to probe the video or to
/// decode a frame aborts the stage.
pub async fn analyze_emotions(
    sampler: &dyn FrameSampler,
    classifier: &dyn EmotionClassifier,
    video: &Path,
    sample_rate: f64,
    out_dir: &Path,
) -> WorkerResult<Vec<EmotionSample>> {
    let duration = sampler.duration(video).await?;
    let times = sample_times(duration, sample_rate);
    debug!(
        "Sampling emotions at {} timestamps over {:.2}s",
        times.len(),
        duration
    );

    let mut samples = Vec::with_capacity(times.len());
    for (index, time) in times.into_iter().enumerate() {
        let frame = sampler.frame_at(video, index, time, out_dir).await?;

        let sample = match classifier.classify(&frame).await {
            Ok(reading) => EmotionSample::from_reading(time, reading),
            Err(e) => {
                warn!("Emotion classification failed at {:.2}s: {}", time, e);
                metrics::record_degraded_sample();
                EmotionSample::degraded(time, e.to_string())
            }
        };
        samples.push(sample);

        // Frames are only needed for the one classification.
        tokio::fs::remove_file(&frame.path).await.ok();
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClassifier, FakeFrames};
    use crate::WorkerError;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_one_sample_per_time_step() {
        let frames = FakeFrames::new(3, 3.5);
        let classifier = FakeClassifier::always("happy");
        let out = PathBuf::from("/unused");

        let samples = analyze_emotions(&frames, &classifier, Path::new("v.mp4"), 1.0, &out)
            .await
            .unwrap();

        let times: Vec<f64> = samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(samples.iter().all(|s| s.dominant_emotion == "happy" && s.num_faces == 1));
    }

    #[tokio::test]
    async fn test_classification_failure_degrades_single_sample() {
        let frames = FakeFrames::new(3, 3.0);
        let classifier = FakeClassifier::failing_at(&[1], "happy");

        let samples = analyze_emotions(
            &frames,
            &classifier,
            Path::new("v.mp4"),
            1.0,
            Path::new("/unused"),
        )
        .await
        .unwrap();

        assert_eq!(samples.len(), 3);
        assert!(!samples[0].is_degraded());
        assert!(samples[1].is_degraded());
        assert_eq!(samples[1].time, 1.0);
        assert_eq!(samples[1].dominant_emotion, "error");
        assert!(samples[1].error.as_deref().unwrap().contains("no face"));
        assert!(!samples[2].is_degraded());
    }

    #[tokio::test]
    async fn test_frame_decode_failure_aborts() {
        let frames = FakeFrames::new(3, 3.0).failing_frame_at(2);
        let classifier = FakeClassifier::always("sad");

        let err = analyze_emotions(
            &frames,
            &classifier,
            Path::new("v.mp4"),
            1.0,
            Path::new("/unused"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::Media(_)));
    }

    #[tokio::test]
    async fn test_zero_duration_yields_no_samples() {
        let frames = FakeFrames::new(0, 0.0);
        let classifier = FakeClassifier::always("sad");

        let samples = analyze_emotions(
            &frames,
            &classifier,
            Path::new("v.mp4"),
            1.0,
            Path::new("/unused"),
        )
        .await
        .unwrap();
        assert!(samples.is_empty());
    }
}
