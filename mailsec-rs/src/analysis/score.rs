//! Bounded scores and their point breakdowns

use serde::{Deserialize, Serialize};

/// Categorical rating derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for ScoreLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreLevel::Poor => write!(f, "Poor"),
            ScoreLevel::Fair => write!(f, "Fair"),
            ScoreLevel::Good => write!(f, "Good"),
            ScoreLevel::Excellent => write!(f, "Excellent"),
        }
    }
}

/// Minimum values for each level, on the scale of a particular `out_of`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl LevelThresholds {
    /// Out of 10: DMARC and the composite score
    pub const TEN_POINT: Self = Self {
        excellent: 8.0,
        good: 6.0,
        fair: 4.0,
    };

    /// Out of 5: SPF and DKIM
    pub const FIVE_POINT: Self = Self {
        excellent: 4.0,
        good: 3.0,
        fair: 2.0,
    };

    /// Out of 3: MX
    pub const THREE_POINT: Self = Self {
        excellent: 2.5,
        good: 2.0,
        fair: 1.0,
    };

    pub fn level(&self, value: f64) -> ScoreLevel {
        if value >= self.excellent {
            ScoreLevel::Excellent
        } else if value >= self.good {
            ScoreLevel::Good
        } else if value >= self.fair {
            ScoreLevel::Fair
        } else {
            ScoreLevel::Poor
        }
    }
}

/// Final score of one analysis
///
/// `0 <= value <= out_of` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub value: f64,
    pub out_of: f64,
    pub level: ScoreLevel,
    pub details: Vec<String>,
}

impl ScoreBreakdown {
    /// Clamp `value` into `[0, out_of]` and derive the level
    pub fn new(value: f64, out_of: f64, thresholds: LevelThresholds, details: Vec<String>) -> Self {
        let value = if value.is_finite() {
            round_to(value.clamp(0.0, out_of), 2)
        } else {
            0.0
        };

        Self {
            value,
            out_of,
            level: thresholds.level(value),
            details,
        }
    }

    /// Zero score with a single explanatory line
    pub fn zero(out_of: f64, reason: impl Into<String>) -> Self {
        Self {
            value: 0.0,
            out_of,
            level: ScoreLevel::Poor,
            details: vec![reason.into()],
        }
    }
}

/// Scored outcome of one record, before it is wrapped in a result envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: ScoreBreakdown,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Accumulates point contributions before clamping
#[derive(Debug, Default)]
pub struct ScoreCard {
    points: f64,
    details: Vec<String>,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or subtract, when negative) points with a reason
    pub fn add(&mut self, points: f64, reason: impl AsRef<str>) {
        self.points += points;
        self.details
            .push(format!("{} {}", format_points(points), reason.as_ref()));
    }

    /// Non-scoring detail line
    pub fn note(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn finish(self, out_of: f64, thresholds: LevelThresholds) -> ScoreBreakdown {
        ScoreBreakdown::new(self.points, out_of, thresholds, self.details)
    }
}

/// Signed point value without trailing zeros: `+5`, `+0.5`, `-1.5`
pub fn format_points(points: f64) -> String {
    let sign = if points < 0.0 { "-" } else { "+" };
    let magnitude = round_to(points.abs(), 2);
    let text = format!("{:.2}", magnitude);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", sign, text)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_high_and_low() {
        let high = ScoreBreakdown::new(14.0, 10.0, LevelThresholds::TEN_POINT, vec![]);
        assert_eq!(high.value, 10.0);
        assert_eq!(high.level, ScoreLevel::Excellent);

        let low = ScoreBreakdown::new(-3.5, 5.0, LevelThresholds::FIVE_POINT, vec![]);
        assert_eq!(low.value, 0.0);
        assert_eq!(low.level, ScoreLevel::Poor);

        let nan = ScoreBreakdown::new(f64::NAN, 3.0, LevelThresholds::THREE_POINT, vec![]);
        assert_eq!(nan.value, 0.0);
    }

    #[test]
    fn test_level_boundaries() {
        let t = LevelThresholds::TEN_POINT;
        assert_eq!(t.level(8.0), ScoreLevel::Excellent);
        assert_eq!(t.level(7.99), ScoreLevel::Good);
        assert_eq!(t.level(6.0), ScoreLevel::Good);
        assert_eq!(t.level(4.0), ScoreLevel::Fair);
        assert_eq!(t.level(3.9), ScoreLevel::Poor);

        let mx = LevelThresholds::THREE_POINT;
        assert_eq!(mx.level(3.0), ScoreLevel::Excellent);
        assert_eq!(mx.level(2.0), ScoreLevel::Good);
        assert_eq!(mx.level(1.0), ScoreLevel::Fair);
        assert_eq!(mx.level(0.0), ScoreLevel::Poor);
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(5.0), "+5");
        assert_eq!(format_points(0.5), "+0.5");
        assert_eq!(format_points(-2.0), "-2");
        assert_eq!(format_points(-0.02), "-0.02");
        assert_eq!(format_points(0.0), "+0");
    }

    #[test]
    fn test_score_card_collects_details() {
        let mut card = ScoreCard::new();
        card.add(1.0, "valid format");
        card.add(-0.5, "penalty");
        card.note("advisory");

        assert_eq!(card.points(), 0.5);
        let score = card.finish(5.0, LevelThresholds::FIVE_POINT);
        assert_eq!(
            score.details,
            vec!["+1 valid format", "-0.5 penalty", "advisory"]
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let score = ScoreBreakdown::new(3.5, 5.0, LevelThresholds::FIVE_POINT, vec![]);
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["outOf"], 5.0);
        assert_eq!(json["level"], "Good");
    }
}
