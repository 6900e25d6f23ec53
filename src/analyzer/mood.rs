//! Mood labels from (valence proxy, energy) via an ordered decision table.
//!
//! Rules are evaluated top to bottom and the first match wins. The Calm rule
//! can never fire: every input it accepts (valence < 0.65) is already claimed by
//! the Neutral rule above it. It stays in the table so the ordering is explicit.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use super::params::{
    MOOD_CALM_ENERGY, MOOD_ENERGETIC_ENERGY, MOOD_HAPPY_VALENCE, MOOD_NEUTRAL_VALENCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mood {
    Happy,
    Neutral,
    Energetic,
    Calm,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Happy, Mood::Neutral, Mood::Energetic, Mood::Calm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "Happy",
            Self::Neutral => "Neutral",
            Self::Energetic => "Energetic",
            Self::Calm => "Calm",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mood label: {0:?}")]
pub struct UnknownMood(pub String);

impl FromStr for Mood {
    type Err = UnknownMood;

    /// Exact, case-sensitive match on the stored labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMood(s.to_string()))
    }
}

/// One row of the decision table.
pub struct MoodRule {
    pub name: &'static str,
    pub label: Mood,
    /// Predicate over `(valence_proxy, energy)`.
    pub applies: fn(f64, f64) -> bool,
}

impl fmt::Debug for MoodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoodRule")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish()
    }
}

pub const MOOD_RULES: [MoodRule; 4] = [
    MoodRule {
        name: "bright and energetic",
        label: Mood::Happy,
        applies: |v, e| v > MOOD_HAPPY_VALENCE && e > MOOD_ENERGETIC_ENERGY,
    },
    MoodRule {
        name: "low valence",
        label: Mood::Neutral,
        applies: |v, _| v < MOOD_NEUTRAL_VALENCE,
    },
    MoodRule {
        name: "energetic",
        label: Mood::Energetic,
        applies: |_, e| e > MOOD_ENERGETIC_ENERGY,
    },
    MoodRule {
        name: "low valence and low energy",
        label: Mood::Calm,
        applies: |v, e| v < MOOD_NEUTRAL_VALENCE && e < MOOD_CALM_ENERGY,
    },
];

/// Label used when no rule matches.
pub const DEFAULT_MOOD: Mood = Mood::Neutral;

/// Index into [`MOOD_RULES`] of the first rule that matches, if any.
pub fn first_matching_rule(valence_proxy: f64, energy: f64) -> Option<usize> {
    MOOD_RULES
        .iter()
        .position(|rule| (rule.applies)(valence_proxy, energy))
}

pub fn classify(valence_proxy: f64, energy: f64) -> Mood {
    first_matching_rule(valence_proxy, energy)
        .map(|i| MOOD_RULES[i].label)
        .unwrap_or(DEFAULT_MOOD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenarios() {
        assert_eq!(classify(0.8, 0.5), Mood::Happy);
        assert_eq!(classify(0.5, 0.5), Mood::Neutral);
        assert_eq!(classify(0.9, 0.2), Mood::Neutral);
        assert_eq!(classify(0.68, 0.4), Mood::Energetic);
    }

    #[test]
    fn test_low_valence_beats_calm() {
        // Calm's conditions hold, but the low-valence rule sits above it
        assert_eq!(first_matching_rule(0.5, 0.1), Some(1));
        assert_eq!(classify(0.5, 0.1), Mood::Neutral);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        assert_eq!(first_matching_rule(0.9, 0.2), None);
        assert_eq!(first_matching_rule(0.65, 0.35), None);
        assert_eq!(classify(0.65, 0.35), DEFAULT_MOOD);
    }

    #[test]
    fn test_thresholds_are_strict() {
        // valence exactly 0.7 is not Happy
        assert_eq!(classify(0.7, 0.5), Mood::Energetic);
        // energy exactly 0.35 is not energetic
        assert_eq!(classify(0.8, 0.35), Mood::Neutral);
    }

    #[test]
    fn test_total_over_unit_square() {
        let steps = 200;
        let mut calm_first = 0;
        for i in 0..=steps {
            for j in 0..=steps {
                let v = i as f64 / steps as f64;
                let e = j as f64 / steps as f64;
                let mood = classify(v, e);
                assert!(Mood::ALL.contains(&mood));

                let first = first_matching_rule(v, e);
                if (MOOD_RULES[0].applies)(v, e) {
                    assert_eq!(first, Some(0));
                } else if (MOOD_RULES[1].applies)(v, e) {
                    assert_eq!(first, Some(1));
                }
                if first == Some(3) {
                    calm_first += 1;
                }
            }
        }
        assert_eq!(calm_first, 0, "calm rule is shadowed by the low-valence rule");
    }

    #[test]
    fn test_label_roundtrip() {
        for mood in Mood::ALL {
            assert_eq!(mood.as_str().parse::<Mood>().unwrap(), mood);
            assert_eq!(mood.to_string(), mood.as_str());
        }
    }

    #[test]
    fn test_unknown_labels_are_rejected() {
        let err = "Sad".parse::<Mood>().unwrap_err();
        assert_eq!(err, UnknownMood("Sad".into()));
        assert_eq!(err.to_string(), "unknown mood label: \"Sad\"");
        // Labels are case-sensitive
        assert!("happy".parse::<Mood>().is_err());
        assert_eq!("Calm".parse::<Mood>(), Ok(Mood::Calm));
    }
}
