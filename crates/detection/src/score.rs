//! Bounded safety score.

use contracts::{ViolationCounts, ViolationKind};

pub const INITIAL_SCORE: u32 = 100;

/// Score band used for the live indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl ScoreColor {
    pub fn for_score(score: u32) -> Self {
        match score {
            80.. => ScoreColor::Green,
            60..=79 => ScoreColor::Yellow,
            40..=59 => ScoreColor::Orange,
            _ => ScoreColor::Red,
        }
    }

    /// ARGB value
    pub fn argb(&self) -> u32 {
        match self {
            ScoreColor::Green => 0xFF4CAF50,
            ScoreColor::Yellow => 0xFFFFEB3B,
            ScoreColor::Orange => 0xFFFF9800,
            ScoreColor::Red => 0xFFF44336,
        }
    }
}

/// Excellent / Good / Fair / Poor, inclusive lower bounds
pub fn score_description(score: u32) -> &'static str {
    match score {
        80.. => "Excellent",
        60..=79 => "Good",
        40..=59 => "Fair",
        _ => "Poor",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreTracker {
    score: u32,
    counts: ViolationCounts,
}

impl Default for ScoreTracker {
    fn default() -> Self {
        Self {
            score: INITIAL_SCORE,
            counts: ViolationCounts::default(),
        }
    }
}

impl ScoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the violation and deduct its penalty, never below 0
    pub fn record(&mut self, kind: ViolationKind) -> u32 {
        self.counts.increment(kind);
        self.score = self.score.saturating_sub(kind.penalty());
        self.score
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn counts(&self) -> ViolationCounts {
        self.counts
    }

    pub fn description(&self) -> &'static str {
        score_description(self.score)
    }

    pub fn color(&self) -> ScoreColor {
        ScoreColor::for_score(self.score)
    }
}
