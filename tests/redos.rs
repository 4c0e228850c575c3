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

use pcre_audit::redos::analyze_pattern;
use pcre_audit::{AnalyzerConfig, Complexity, HotspotKind, RedosAnalyzer, ScoreWeights, Severity};

mod common;

#[test]
fn test_nested_quantifier_is_severe() {
    let analysis = common::analyze("/(a+)+$/");
    assert!(matches!(analysis.severity, Severity::High | Severity::Critical));
    assert_eq!(analysis.complexity, Complexity::Exponential);
    assert_eq!(analysis.vulnerable_offset, Some(0));
    assert!(!analysis.recommendations.is_empty());
    assert!(analysis.score > 0);
}

#[test]
fn test_atomic_group_lowers_severity() {
    let unguarded = common::severity("/(a+)+$/");
    let guarded = common::severity("/(?>a+)+$/");
    assert!(guarded < unguarded, "{} should be below {}", guarded, unguarded);
    assert!(!guarded.exceeds_threshold(Severity::Low));
}

#[test]
fn test_classic_vulnerable_patterns() {
    for pattern in &[
        "/^(a+)+$/",
        "/^(a*)*$/",
        "/^([a-zA-Z0-9]+)*$/",
        "/^(a|a)*$/",
        "/^(a|aa)+$/",
        r"/^(\w+\s?)*$/",
    ] {
        let analysis = common::analyze(pattern);
        assert!(
            analysis.exceeds_threshold(Severity::Medium),
            "{} scored {}",
            pattern,
            analysis.severity
        );
    }
}

#[test]
fn test_safe_patterns() {
    for pattern in &[
        "/^[a-z0-9._%+-]+@[a-z0-9.-]+\\.[a-z]{2,}$/i",
        r"/^\d{4}-\d{2}-\d{2}$/",
        "/^(?:https?):\\/\\/[^\\s]+$/",
        "/foo|bar|baz/",
        "/(ab)+c/",
        r"/(ab)\1*/",
    ] {
        let analysis = common::analyze(pattern);
        assert_eq!(analysis.severity, Severity::Safe, "{}", pattern);
        assert!(analysis.hotspots.is_empty());
        assert!(analysis.recommendations.is_empty());
    }
}

#[test]
fn test_polynomial_adjacent_repetitions() {
    let analysis = common::analyze(r"/^\d+\d*$/");
    assert_eq!(analysis.hotspots[0].kind, HotspotKind::AdjacentQuantifiers);
    assert_eq!(analysis.complexity, Complexity::Polynomial);
    assert_eq!(analysis.severity, Severity::Medium);
}

#[test]
fn test_backreference_to_repeated_capture() {
    let analysis = common::analyze(r"/^(?:(a+)\1)+$/");
    assert!(analysis
        .hotspots
        .iter()
        .any(|h| h.kind == HotspotKind::BackreferenceLoop && h.fragment == r"\1"));
    assert!(analysis.exceeds_threshold(Severity::Medium));
}

#[test]
fn test_bounded_repetition_of_overlapping_alternation() {
    let analysis = common::analyze("/(a|aa){1,30}$/");
    assert!(analysis.exceeds_threshold(Severity::Safe));
    assert_eq!(analysis.hotspots[0].kind, HotspotKind::OverlappingAlternation);
    assert_eq!(analysis.complexity, Complexity::Polynomial);
    for recommendation in &analysis.recommendations {
        let replacement = recommendation.replacement.as_ref().unwrap();
        let fixed = format!("/{}$/", replacement);
        assert!(common::severity(&fixed) < analysis.severity, "{}", fixed);
    }
}

#[test]
fn test_analyze_pattern_reports_parse_errors() {
    assert!(analyze_pattern("/(a+/").is_err());
    assert!(pcre_audit::analyze_pattern("/[/").is_err());
    assert_eq!(pcre_audit::analyze_pattern("/abc/").unwrap().severity, Severity::Safe);
}

#[test]
fn test_custom_weights() {
    let config = AnalyzerConfig {
        weights: ScoreWeights {
            high: 7,
            ..ScoreWeights::default()
        },
        ..AnalyzerConfig::default()
    };
    let regex = common::regex("/(a+)+$/");
    assert_eq!(RedosAnalyzer::with_config(config).analyze(&regex).score, 7);
}

#[test]
fn test_recommendations_reparse() {
    let analysis = common::analyze("/^(a+)+$/");
    for recommendation in &analysis.recommendations {
        let replacement = recommendation.replacement.as_ref().unwrap();
        let fixed = format!("/^{}$/", replacement);
        let severity = common::severity(&fixed);
        assert!(severity < Severity::High, "{} is still {}", fixed, severity);
    }
}

#[test]
fn test_analysis_serializes() {
    let analysis = common::analyze("/(a+)+$/");
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["severity"], "high");
    assert_eq!(json["complexity"], "exponential");
    assert_eq!(json["hotspots"][0]["kind"], "nested_quantifier");
    assert_eq!(json["hotspots"][0]["span"]["start"], 0);
}

#[test]
fn test_hotspot_kind_display_matches_serialization() {
    for kind in &[
        HotspotKind::NestedQuantifier,
        HotspotKind::OverlappingAlternation,
        HotspotKind::BackreferenceLoop,
        HotspotKind::EmptyRepetition,
        HotspotKind::AdjacentQuantifiers,
    ] {
        assert_eq!(serde_json::to_value(kind).unwrap(), kind.to_string());
    }
}
