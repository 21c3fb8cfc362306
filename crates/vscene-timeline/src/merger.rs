//! Positional merge of transcript sentences with emotion samples.
//!
//! Sentence `i` takes emotion sample `i`. There is no time correlation
//! between the two sequences; sentences beyond the last sample are neutral.

use vscene_models::{EmotionSample, MergedUnit};

/// Literal separator between sentence units.
pub const SENTENCE_DELIMITER: &str = ". ";

/// Split text on `". "`, trimming each unit and dropping empty ones.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn merge_text_and_emotions(transcript_text: &str, emotions: &[EmotionSample]) -> Vec<MergedUnit> {
    split_sentences(transcript_text)
        .into_iter()
        .enumerate()
        .map(|(i, sentence)| match emotions.get(i) {
            Some(sample) => MergedUnit {
                text: sentence.to_string(),
                emotion: sample.dominant_emotion.clone(),
                emotion_scores: sample.emotion_scores.clone(),
                time: Some(sample.time),
            },
            None => MergedUnit::neutral(sentence),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscene_models::{EmotionReading, EmotionScores};

    fn sample(time: f64, label: &str) -> EmotionSample {
        let mut scores = EmotionScores::new();
        scores.insert(label.to_string(), 0.8);
        EmotionSample::from_reading(
            time,
            EmotionReading {
                dominant_emotion: label.to_string(),
                emotion_scores: scores,
            },
        )
    }

    #[test]
    fn test_split_trims_and_drops_empty_units() {
        assert_eq!(
            split_sentences(" Hello there. How are you.  . Fine"),
            vec!["Hello there", "How are you", "Fine"]
        );
        assert!(split_sentences("").is_empty());
        assert!(split_sentences(" . ").is_empty());
    }

    #[test]
    fn test_extra_sentences_default_to_neutral() {
        let emotions = vec![sample(0.0, "happy"), sample(1.0, "sad")];
        let merged = merge_text_and_emotions("One. Two. Three", &emotions);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].emotion, "happy");
        assert_eq!(merged[0].time, Some(0.0));
        assert_eq!(merged[1].emotion, "sad");
        assert_eq!(merged[2].text, "Three");
        assert_eq!(merged[2].emotion, "neutral");
        assert!(merged[2].emotion_scores.is_empty());
        assert_eq!(merged[2].time, None);
    }

    #[test]
    fn test_surplus_samples_are_ignored() {
        let emotions = vec![sample(0.0, "happy"), sample(1.0, "sad"), sample(2.0, "angry")];
        let merged = merge_text_and_emotions("Only one sentence", &emotions);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].emotion, "happy");
    }

    #[test]
    fn test_degraded_sample_is_carried_positionally() {
        let emotions = vec![EmotionSample::degraded(0.0, "no face")];
        let merged = merge_text_and_emotions("Hi. Bye", &emotions);
        assert_eq!(merged[0].emotion, "error");
        assert!(merged[0].emotion_scores.is_empty());
        assert_eq!(merged[1].emotion, "neutral");
    }
}
