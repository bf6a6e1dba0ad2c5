use std::collections::VecDeque;

use crate::recognizer::RawPrediction;

/// Turns the noisy per-frame prediction stream into a short de-duplicated transcript.
///
/// A prediction is accepted when its confidence is above the threshold, its label
/// is not the "none" sentinel, and it differs from the last accepted label. Only
/// the most recent `capacity` accepted labels are kept.
#[derive(Debug, Clone)]
pub struct ResultStabilizer {
    transcript: VecDeque<String>,
    capacity: usize,
    threshold: f32,
    none_label: String,
}

impl Default for ResultStabilizer {
    fn default() -> Self {
        Self::new(3, 0.7, "none")
    }
}

impl ResultStabilizer {
    pub fn new(capacity: usize, threshold: f32, none_label: &str) -> Self {
        let capacity = capacity.max(1);
        Self {
            transcript: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
            none_label: none_label.to_string(),
        }
    }

    /// Apply the acceptance rule. Returns the new transcript text if it changed.
    pub fn offer(&mut self, prediction: &RawPrediction) -> Option<String> {
        if prediction.confidence <= self.threshold || prediction.label == self.none_label {
            return None;
        }
        if self.transcript.back() == Some(&prediction.label) {
            return None;
        }

        if self.transcript.len() == self.capacity {
            self.transcript.pop_front();
        }
        self.transcript.push_back(prediction.label.clone());
        Some(self.text())
    }

    /// Drop every accepted label. The next accepted label is treated as new.
    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Space-joined transcript, empty when nothing is accepted.
    pub fn text(&self) -> String {
        self.transcript
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[cfg(test)]
    pub fn labels(&self) -> Vec<&str> {
        self.transcript.iter().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(label: &str, confidence: f32) -> RawPrediction {
        RawPrediction::new(label, confidence)
    }

    #[test]
    fn test_low_confidence_and_none_are_ignored() {
        let mut stabilizer = ResultStabilizer::default();
        assert_eq!(stabilizer.offer(&p("toi", 0.7)), None);
        assert_eq!(stabilizer.offer(&p("toi", 0.2)), None);
        assert_eq!(stabilizer.offer(&p("none", 0.99)), None);
        assert!(stabilizer.is_empty());
        assert_eq!(stabilizer.text(), "");
    }

    #[test]
    fn test_held_sign_emits_once() {
        let mut stabilizer = ResultStabilizer::default();
        assert_eq!(stabilizer.offer(&p("thich", 0.8)), Some("thich".into()));
        for _ in 0..10 {
            assert_eq!(stabilizer.offer(&p("thich", 0.95)), None);
        }
        assert_eq!(stabilizer.labels(), vec!["thich"]);
    }

    #[test]
    fn test_four_tick_scenario() {
        let mut stabilizer = ResultStabilizer::default();
        let ticks = [
            (p("hello", 0.9), vec!["hello"]),
            (p("hello", 0.95), vec!["hello"]),
            (p("thanks", 0.8), vec!["hello", "thanks"]),
            (p("none", 0.99), vec!["hello", "thanks"]),
        ];
        for (prediction, expected) in ticks {
            stabilizer.offer(&prediction);
            assert_eq!(stabilizer.labels(), expected);
        }
        assert_eq!(stabilizer.text(), "hello thanks");
    }

    #[test]
    fn test_keeps_last_three_in_order() {
        let mut stabilizer = ResultStabilizer::default();
        for label in ["a", "b", "c", "d", "e"] {
            stabilizer.offer(&p(label, 0.9));
        }
        assert_eq!(stabilizer.labels(), vec!["c", "d", "e"]);
        assert_eq!(stabilizer.text(), "c d e");
    }

    #[test]
    fn test_label_reappearing_after_another_is_accepted() {
        let mut stabilizer = ResultStabilizer::default();
        stabilizer.offer(&p("toi", 0.9));
        stabilizer.offer(&p("thich", 0.9));
        assert_eq!(stabilizer.offer(&p("toi", 0.9)), Some("toi thich toi".into()));
    }

    #[test]
    fn test_clear_then_same_label_is_new() {
        let mut stabilizer = ResultStabilizer::default();
        stabilizer.offer(&p("mau hong", 0.9));
        stabilizer.clear();
        assert_eq!(stabilizer.text(), "");
        assert_eq!(stabilizer.offer(&p("mau hong", 0.9)), Some("mau hong".into()));
    }

    #[test]
    fn test_custom_window_and_threshold() {
        let mut stabilizer = ResultStabilizer::new(1, 0.5, "blank");
        assert_eq!(stabilizer.offer(&p("a", 0.6)), Some("a".into()));
        assert_eq!(stabilizer.offer(&p("blank", 0.9)), None);
        assert_eq!(stabilizer.offer(&p("none", 0.9)), Some("none".into()));
        assert_eq!(stabilizer.labels(), vec!["none"]);
    }
}
