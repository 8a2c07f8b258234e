//! Evaluation swings between consecutive search results.

use uci::Score;

/// A drop larger than this many centipawns is flagged as a blunder.
pub const BLUNDER_THRESHOLD_CP: i32 = 100;

/// Outcome of comparing one evaluation with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swing {
    /// Change in centipawns; zero when either side is unknown.
    pub delta: i32,
    /// `delta < -BLUNDER_THRESHOLD_CP`.
    pub blunder: bool,
}

/// Tracks the most recent evaluation and the blunder flag for one session.
///
/// Note this compares successive search depths of the same position, not
/// successive moves of a game: a deeper search that revises the score down
/// by more than a pawn is what raises the flag.
#[derive(Debug, Clone, Default)]
pub struct SwingDetector {
    last: Option<Score>,
    blunder: bool,
}

impl SwingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `current` with the previous evaluation and remembers it.
    ///
    /// An unknown `current` is remembered as unknown, so the next comparison
    /// yields a zero delta.
    pub fn record(&mut self, current: Option<Score>) -> Swing {
        let delta = match (current, self.last) {
            (Some(now), Some(before)) => now
                .to_centipawns()
                .saturating_sub(before.to_centipawns()),
            _ => 0,
        };
        self.blunder = delta < -BLUNDER_THRESHOLD_CP;
        self.last = current;
        Swing {
            delta,
            blunder: self.blunder,
        }
    }

    /// The flag raised by the latest comparison.
    pub fn blunder(&self) -> bool {
        self.blunder
    }

    /// The latest recorded evaluation.
    pub fn last(&self) -> Option<Score> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_result_has_no_delta() {
        let mut detector = SwingDetector::new();
        let swing = detector.record(Some(Score::Cp(100)));
        assert_eq!(swing, Swing { delta: 0, blunder: false });
        assert_eq!(detector.last(), Some(Score::Cp(100)));
    }

    #[test]
    fn drop_of_one_and_a_half_pawns_is_a_blunder() {
        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(100)));
        let swing = detector.record(Some(Score::Cp(-50)));
        assert_eq!(swing.delta, -150);
        assert!(swing.blunder);
        assert!(detector.blunder());
    }

    #[test]
    fn drop_of_exactly_one_pawn_is_not() {
        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(100)));
        let swing = detector.record(Some(Score::Cp(0)));
        assert_eq!(swing.delta, -100);
        assert!(!swing.blunder);
    }

    #[test]
    fn flag_clears_on_recovery() {
        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(300)));
        assert!(detector.record(Some(Score::Cp(0))).blunder);
        assert!(!detector.record(Some(Score::Cp(20))).blunder);
    }

    #[test]
    fn unknown_evaluation_resets_comparison() {
        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(300)));
        assert_eq!(detector.record(None).delta, 0);
        assert_eq!(detector.record(Some(Score::Cp(-300))).delta, 0);
    }

    #[test]
    fn mate_scores_are_extremes() {
        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Mate(4)));
        assert!(detector.record(Some(Score::Cp(900))).blunder);

        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(-900)));
        assert!(detector.record(Some(Score::Mate(-6))).blunder);

        let mut detector = SwingDetector::new();
        detector.record(Some(Score::Cp(50)));
        assert!(!detector.record(Some(Score::Mate(3))).blunder);
    }
}
