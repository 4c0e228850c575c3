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

//! Static detection of catastrophic backtracking (ReDoS).
//!
//! The analyzer walks the AST once, computing for every node whether it can
//! match the empty string, which characters a match can start and end with,
//! and how deeply unbounded repetitions nest inside it. Rules fire on the
//! shapes that make a backtracking engine explore exponentially or
//! polynomially many paths, each producing a [`Hotspot`]. The pattern is
//! never compiled or executed.

use std::fmt;

use serde::Serialize;

use crate::ast::{Regex, Span};
use crate::error::Result;

mod analyzer;
mod severity;

pub use self::analyzer::RedosAnalyzer;
pub use self::severity::Severity;

/// The rule that produced a hotspot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotKind {
    /// An unbounded repetition of something that itself repeats without
    /// bound, e.g. `(a+)+`.
    NestedQuantifier,
    /// Alternatives that can start with the same character inside a
    /// repetition, e.g. `(a|ab)*` or `(a|aa){1,30}`.
    OverlappingAlternation,
    /// A backreference to a repeated capture, itself repeated without
    /// bound, e.g. `(?:(a+)\1)+`.
    BackreferenceLoop,
    /// An unbounded repetition of something that can match the empty
    /// string, e.g. `(a?)*`.
    EmptyRepetition,
    /// Consecutive unbounded repetitions that can match the same characters,
    /// e.g. `\d+\d+`.
    AdjacentQuantifiers,
}

impl fmt::Display for HotspotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedQuantifier => write!(f, "nested_quantifier"),
            Self::OverlappingAlternation => write!(f, "overlapping_alternation"),
            Self::BackreferenceLoop => write!(f, "backreference_loop"),
            Self::EmptyRepetition => write!(f, "empty_repetition"),
            Self::AdjacentQuantifiers => write!(f, "adjacent_quantifiers"),
        }
    }
}

/// Worst-case backtracking growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// No risky construct left unmitigated.
    Linear,
    /// O(n^k), from overlapping adjacent repetitions.
    Polynomial,
    /// O(2^n), from nested or ambiguous repetition.
    Exponential,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Polynomial => write!(f, "polynomial"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

/// One rule firing at one subpattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotspot {
    /// Which rule fired.
    pub kind: HotspotKind,
    /// The subpattern responsible.
    pub span: Span,
    /// Severity after mitigation.
    pub severity: Severity,
    /// Whether an atomic group or possessive quantifier lowered the severity.
    pub mitigated: bool,
    /// The source text of `span`.
    pub fragment: String,
    /// Nesting depth of unbounded repetitions at this point.
    pub star_height: usize,
}

/// A suggested rewrite of a risky subpattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    /// The subpattern to replace.
    pub span: Span,
    /// Its current text.
    pub original: String,
    /// Suggested replacement text, when a mechanical rewrite exists.
    pub replacement: Option<String>,
    /// What to do, for humans.
    pub message: String,
}

/// The result of analyzing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReDoSAnalysis {
    /// The highest hotspot severity, or `Unknown`.
    pub severity: Severity,
    /// Weighted hotspot count, 0 to 100.
    pub score: u32,
    /// Start of the most responsible subpattern, when a single hotspot
    /// dominates.
    pub vulnerable_offset: Option<usize>,
    /// Suggested rewrites, most severe first.
    pub recommendations: Vec<Recommendation>,
    /// Every rule that fired, in pattern order.
    pub hotspots: Vec<Hotspot>,
    /// Worst-case growth class.
    pub complexity: Complexity,
}

impl ReDoSAnalysis {
    /// Whether the severity is strictly above `threshold`.
    pub fn exceeds_threshold(&self, threshold: Severity) -> bool {
        self.severity.exceeds_threshold(threshold)
    }
}

/// Analyze a parsed pattern with the default settings.
pub fn analyze(regex: &Regex) -> ReDoSAnalysis {
    RedosAnalyzer::new().analyze(regex)
}

/// Parse a pattern literal and analyze it with the default settings.
pub fn analyze_pattern(pattern: &str) -> Result<ReDoSAnalysis> {
    let regex = crate::parse(pattern)?;
    Ok(analyze(&regex))
}
