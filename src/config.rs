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

//! Parser and analyzer configuration.

use serde::{Deserialize, Serialize};

/// Default maximum parenthesis nesting, matching PCRE2's compile-time default.
pub const DEFAULT_NEST_LIMIT: usize = 250;

/// Default maximum lookbehind length in code units (PCRE2_MAX_VARLOOKBEHIND).
pub const DEFAULT_MAX_LOOKBEHIND: usize = 255;

/// Default maximum traversal depth for visitors.
pub const DEFAULT_DEPTH_LIMIT: usize = 1024;

/// The PCRE release a pattern is checked against.
///
/// The grammar grows between releases, so escapes, quantifier forms and
/// assertion syntaxes are gated on the dialect. Each variant corresponds to
/// the library bundled by a family of PHP releases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// PCRE 8.x, bundled before PHP 7.3.
    Pcre1,
    /// PCRE2 10.30 (PHP 7.3).
    Pcre2_10_30,
    /// PCRE2 10.34 (PHP 7.4 and 8.0).
    Pcre2_10_34,
    /// PCRE2 10.43 (PHP 8.4).
    #[default]
    Pcre2_10_43,
    /// PCRE2 10.45.
    Pcre2_10_45,
}

impl Dialect {
    /// `\N{U+hhhh}` code point escapes.
    pub fn supports_code_point_escape(self) -> bool {
        self >= Dialect::Pcre2_10_30
    }

    /// The `n` (no auto capture) inline flag.
    pub fn supports_no_auto_capture(self) -> bool {
        self >= Dialect::Pcre2_10_30
    }

    /// `(?^)` resetting `imnsx`.
    pub fn supports_caret_reset(self) -> bool {
        self >= Dialect::Pcre2_10_34
    }

    /// Alphabetic assertion names such as `(*pla:...)` and `(*atomic:...)`.
    pub fn supports_alpha_assertions(self) -> bool {
        self >= Dialect::Pcre2_10_34
    }

    /// `{,n}` as a shorthand for `{0,n}`.
    pub fn supports_open_lower_bound(self) -> bool {
        self >= Dialect::Pcre2_10_43
    }

    /// Lookbehinds whose alternatives differ in length, up to a maximum.
    pub fn supports_variable_lookbehind(self) -> bool {
        self >= Dialect::Pcre2_10_43
    }

    /// `&&` and `--` operators inside character classes.
    pub fn supports_class_set_operations(self) -> bool {
        self >= Dialect::Pcre2_10_45
    }
}

/// Settings for the pattern parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Target PCRE release.
    #[serde(default)]
    pub dialect: Dialect,

    /// Maximum parenthesis nesting depth.
    #[serde(default = "default_nest_limit")]
    pub nest_limit: usize,

    /// Maximum length of a variable-length lookbehind, for dialects that allow them.
    #[serde(default = "default_max_lookbehind")]
    pub max_lookbehind: usize,

    /// Accept lookbehinds with no computable maximum length.
    #[serde(default)]
    pub allow_unbounded_lookbehind: bool,
}

fn default_nest_limit() -> usize {
    DEFAULT_NEST_LIMIT
}

fn default_max_lookbehind() -> usize {
    DEFAULT_MAX_LOOKBEHIND
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            nest_limit: default_nest_limit(),
            max_lookbehind: default_max_lookbehind(),
            allow_unbounded_lookbehind: false,
        }
    }
}

/// Settings for the ReDoS analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum AST depth the analyzer walks before giving up with `Unknown`.
    #[serde(default = "default_depth_limit")]
    pub depth_limit: usize,

    /// Keep hotspots whose severity was reduced by an atomic group or a
    /// possessive quantifier in the report.
    #[serde(default = "default_true")]
    pub report_mitigated: bool,

    /// Upper bound on the number of recommendations returned.
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// Points each hotspot adds to the score, by severity.
    #[serde(default)]
    pub weights: ScoreWeights,
}

/// Score contribution per hotspot severity; the total is capped at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            low: 3,
            medium: 10,
            high: 25,
            critical: 40,
        }
    }
}

fn default_depth_limit() -> usize {
    DEFAULT_DEPTH_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_max_recommendations() -> usize {
    8
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            depth_limit: default_depth_limit(),
            report_mitigated: true,
            max_recommendations: default_max_recommendations(),
            weights: ScoreWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_ordering_gates_features() {
        assert!(!Dialect::Pcre1.supports_code_point_escape());
        assert!(Dialect::Pcre2_10_30.supports_no_auto_capture());
        assert!(!Dialect::Pcre2_10_34.supports_open_lower_bound());
        assert!(Dialect::default().supports_variable_lookbehind());
        assert!(!Dialect::default().supports_class_set_operations());
        assert!(Dialect::Pcre2_10_45.supports_class_set_operations());
    }

    #[test]
    fn parser_config_defaults_from_empty_json() {
        let config: ParserConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());
        assert_eq!(config.nest_limit, DEFAULT_NEST_LIMIT);
    }

    #[test]
    fn analyzer_config_partial_json() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"depth_limit": 12, "report_mitigated": false}"#).unwrap();
        assert_eq!(config.depth_limit, 12);
        assert!(!config.report_mitigated);
        assert_eq!(config.max_recommendations, 8);
        assert_eq!(config.weights, ScoreWeights::default());
    }

    #[test]
    fn score_weights_fill_missing_fields() {
        let weights: ScoreWeights = serde_json::from_str(r#"{"high": 30}"#).unwrap();
        assert_eq!(weights.high, 30);
        assert_eq!(weights.critical, 40);
    }

    #[test]
    fn dialect_names_are_snake_case() {
        let dialect: Dialect = serde_json::from_str("\"pcre2_10_45\"").unwrap();
        assert_eq!(dialect, Dialect::Pcre2_10_45);
    }
}
