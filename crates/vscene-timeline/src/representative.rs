//! Medoid selection of a scene's representative caption.

use vscene_models::RepresentativeCaption;

use crate::similarity::similarity;

/// Pick the caption most similar, in aggregate, to every other caption.
///
/// `scores[i]` is the sum of `similarity(captions[i], captions[j])` over all
/// `j != i`. Ties go to the smallest index. A single caption is returned
/// as-is with a score vector of `[1.0]`. Returns `None` for an empty slice.
pub fn representative_caption<S: AsRef<str>>(captions: &[S]) -> Option<RepresentativeCaption> {
    match captions {
        [] => None,
        [only] => Some(RepresentativeCaption {
            text: only.as_ref().to_string(),
            index: 0,
            scores: vec![1.0],
        }),
        _ => {
            let scores: Vec<f64> = captions
                .iter()
                .enumerate()
                .map(|(i, ci)| {
                    captions
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, cj)| similarity(ci.as_ref(), cj.as_ref()))
                        .sum()
                })
                .collect();

            let mut best = 0;
            for (i, score) in scores.iter().enumerate().skip(1) {
                if *score > scores[best] {
                    best = i;
                }
            }

            Some(RepresentativeCaption {
                text: captions[best].as_ref().to_string(),
                index: best,
                scores,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scene_has_no_representative() {
        let captions: [&str; 0] = [];
        assert!(representative_caption(&captions).is_none());
    }

    #[test]
    fn test_single_caption_short_circuits() {
        let rep = representative_caption(&["a quiet street"]).unwrap();
        assert_eq!(rep.text, "a quiet street");
        assert_eq!(rep.index, 0);
        assert_eq!(rep.scores, vec![1.0]);
    }

    #[test]
    fn test_first_tied_maximum_wins() {
        let rep = representative_caption(&["x", "x", "y"]).unwrap();
        assert_eq!(rep.index, 0);
        assert_eq!(rep.text, "x");
        assert_eq!(rep.scores, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_medoid_beats_outliers() {
        let captions = [
            "a man riding a horse on a beach",
            "a man riding a horse",
            "a horse on a beach",
            "a bowl of fruit",
        ];
        let rep = representative_caption(&captions).unwrap();
        assert_eq!(rep.index, 0);
        assert_eq!(rep.scores.len(), 4);
        assert!(rep.scores[3] < rep.scores[0]);
    }
}
