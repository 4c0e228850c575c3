// Copyright 2016 The Fancy Regex Authors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How likely a pattern is to backtrack catastrophically.
///
/// `Safe < Low < Medium < High < Critical`. `Unknown` is reported when the
/// analysis was inconclusive; it is unordered with respect to every other
/// level and never exceeds a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No risky construct found.
    Safe,
    /// A risky shape that is bounded or already mitigated.
    Low,
    /// Polynomial backtracking is possible.
    Medium,
    /// Exponential backtracking is likely.
    High,
    /// Deeply nested exponential backtracking.
    Critical,
    /// The analysis could not classify the pattern.
    Unknown,
}

impl Severity {
    /// Ordinal rank, `None` for `Unknown`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Severity::Safe => Some(0),
            Severity::Low => Some(1),
            Severity::Medium => Some(2),
            Severity::High => Some(3),
            Severity::Critical => Some(4),
            Severity::Unknown => None,
        }
    }

    fn from_rank(rank: u8) -> Severity {
        match rank {
            0 => Severity::Safe,
            1 => Severity::Low,
            2 => Severity::Medium,
            3 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Whether this level is strictly above `threshold`.
    ///
    /// `Unknown` never exceeds anything and nothing exceeds `Unknown`.
    pub fn exceeds_threshold(self, threshold: Severity) -> bool {
        match (self.rank(), threshold.rank()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }

    /// Lower by `ranks` levels, but not below `Low`.
    ///
    /// `Safe` and `Unknown` are unchanged.
    pub fn reduce(self, ranks: u8) -> Severity {
        match self.rank() {
            Some(0) | None => self,
            Some(rank) => Severity::from_rank(rank.saturating_sub(ranks).max(1)),
        }
    }

    /// The higher of two levels; a known level wins over `Unknown`.
    pub fn max(self, other: Severity) -> Severity {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) if b > a => other,
            (None, Some(_)) => other,
            _ => self,
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "SAFE"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown severity: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERED: [Severity; 5] = [
        Severity::Safe,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    #[test]
    fn test_severity_ordering() {
        for pair in ORDERED.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[1].exceeds_threshold(pair[0]));
            assert!(!pair[0].exceeds_threshold(pair[1]));
        }
        assert!(!Severity::High.exceeds_threshold(Severity::High));
    }

    #[test]
    fn test_unknown_is_unordered() {
        for level in ORDERED {
            assert_eq!(Severity::Unknown.partial_cmp(&level), None);
            assert!(!Severity::Unknown.exceeds_threshold(level));
            assert!(!level.exceeds_threshold(Severity::Unknown));
        }
        assert_eq!(Severity::Unknown.max(Severity::Low), Severity::Low);
    }

    #[test]
    fn test_reduce_floors_at_low() {
        assert_eq!(Severity::Critical.reduce(2), Severity::Medium);
        assert_eq!(Severity::High.reduce(2), Severity::Low);
        assert_eq!(Severity::Medium.reduce(2), Severity::Low);
        assert_eq!(Severity::Safe.reduce(2), Severity::Safe);
        assert_eq!(Severity::Unknown.reduce(2), Severity::Unknown);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Severity::High.to_string(), "HIGH");
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("MEDIUM".parse::<Severity>(), Ok(Severity::Medium));
        assert!("severe".parse::<Severity>().is_err());
    }
}
