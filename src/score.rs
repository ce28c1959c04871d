//! Hard/soft score used to compare candidate schedules.
//!
//! Scores compare lexicographically: any hard improvement beats any soft one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

/// A two-level score. Zero is perfect; penalties are negative.
///
/// # Examples
///
/// ```
/// use maintenance_scheduling::score::HardSoftScore;
///
/// let infeasible = HardSoftScore::of(-1, 0);
/// let feasible = HardSoftScore::of(0, -500);
///
/// assert!(feasible > infeasible);
/// assert!(feasible.is_feasible());
/// assert_eq!(feasible.to_string(), "0hard/-500soft");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HardSoftScore {
    hard: i64,
    soft: i64,
}

impl HardSoftScore {
    pub const ZERO: Self = Self { hard: 0, soft: 0 };

    pub const fn of(hard: i64, soft: i64) -> Self {
        Self { hard, soft }
    }

    pub const fn of_hard(hard: i64) -> Self {
        Self { hard, soft: 0 }
    }

    pub const fn of_soft(soft: i64) -> Self {
        Self { hard: 0, soft }
    }

    pub fn hard(&self) -> i64 {
        self.hard
    }

    pub fn soft(&self) -> i64 {
        self.soft
    }

    /// Returns true when no hard constraint is broken.
    pub fn is_feasible(&self) -> bool {
        self.hard >= 0
    }

    /// Multiplies both levels by `factor`.
    pub fn multiply(&self, factor: i64) -> Self {
        Self {
            hard: self.hard.saturating_mul(factor),
            soft: self.soft.saturating_mul(factor),
        }
    }
}

impl Add for HardSoftScore {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            hard: self.hard.saturating_add(rhs.hard),
            soft: self.soft.saturating_add(rhs.soft),
        }
    }
}

impl AddAssign for HardSoftScore {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for HardSoftScore {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            hard: self.hard.saturating_sub(rhs.hard),
            soft: self.soft.saturating_sub(rhs.soft),
        }
    }
}

impl Neg for HardSoftScore {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            hard: self.hard.saturating_neg(),
            soft: self.soft.saturating_neg(),
        }
    }
}

impl fmt::Display for HardSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

/// Error returned when a score string is not of the form `"<n>hard/<n>soft"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid score '{0}', expected '<n>hard/<n>soft'")]
pub struct ParseScoreError(String);

impl FromStr for HardSoftScore {
    type Err = ParseScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseScoreError(s.to_string());
        let (hard, soft) = s.trim().split_once('/').ok_or_else(invalid)?;
        let hard = hard
            .strip_suffix("hard")
            .and_then(|h| h.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let soft = soft
            .strip_suffix("soft")
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        Ok(Self { hard, soft })
    }
}

impl Serialize for HardSoftScore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HardSoftScore {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_dominates_soft() {
        assert!(HardSoftScore::of(0, -10_000) > HardSoftScore::of(-1, 0));
        assert!(HardSoftScore::of(-2, 5) < HardSoftScore::of(-1, -5));
        assert!(HardSoftScore::of(0, -1) < HardSoftScore::ZERO);
    }

    #[test]
    fn test_parse_display() {
        let score: HardSoftScore = "-3hard/-120soft".parse().unwrap();
        assert_eq!(score, HardSoftScore::of(-3, -120));
        assert_eq!(score.to_string(), "-3hard/-120soft");
        assert!("3/4".parse::<HardSoftScore>().is_err());
        assert!("hard/soft".parse::<HardSoftScore>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let mut total = HardSoftScore::ZERO;
        total += HardSoftScore::of_hard(1).multiply(-2);
        total += HardSoftScore::of_soft(-7);
        assert_eq!(total, HardSoftScore::of(-2, -7));
        assert_eq!(-total, HardSoftScore::of(2, 7));
        assert_eq!(total - HardSoftScore::of(-2, 0), HardSoftScore::of_soft(-7));
    }

    #[test]
    fn test_negation_saturates() {
        let worst = HardSoftScore::of(i64::MIN, i64::MIN);
        assert_eq!(-worst, HardSoftScore::of(i64::MAX, i64::MAX));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&HardSoftScore::of(0, -4)).unwrap();
        assert_eq!(json, "\"0hard/-4soft\"");
        let back: HardSoftScore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HardSoftScore::of(0, -4));
    }
}
