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

use bit_set::BitSet;
use tracing::{debug, trace};

use super::{Complexity, Hotspot, HotspotKind, ReDoSAnalysis, Recommendation, Severity};
use crate::ast::*;
use crate::charset::{self, CharSet};
use crate::config::AnalyzerConfig;
use crate::error::VisitResult;
use crate::printer::print;
use crate::visit::{DepthGuard, Fold, MakePossessive, Visitor, WrapAtomic};
use crate::width::WidthAnalyzer;

/// Severity ranks removed by an atomic group or possessive quantifier.
const MITIGATION: u8 = 2;

/// Bounded repetitions at least this large are ranked close to unbounded ones.
const LARGE_BOUND: usize = 10;

/// Configurable ReDoS analyzer.
///
/// ```
/// use pcre_audit::redos::{RedosAnalyzer, Severity};
///
/// let regex = pcre_audit::parse("/^(a+)+$/").unwrap();
/// let analysis = RedosAnalyzer::new().analyze(&regex);
/// assert!(analysis.exceeds_threshold(Severity::Medium));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RedosAnalyzer {
    config: AnalyzerConfig,
}

impl RedosAnalyzer {
    /// An analyzer with default settings.
    pub fn new() -> RedosAnalyzer {
        RedosAnalyzer::default()
    }

    /// An analyzer with the given settings.
    pub fn with_config(config: AnalyzerConfig) -> RedosAnalyzer {
        RedosAnalyzer { config }
    }

    /// The current settings.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze `regex`. Never fails: traversal problems yield `Unknown`.
    pub fn analyze(&self, regex: &Regex) -> ReDoSAnalysis {
        let mut scan = Scan::new(regex, &self.config);
        let complete = regex.accept(&mut scan).is_ok();
        scan.finish(complete)
    }
}

/// What the analysis knows about a subtree.
#[derive(Debug, Clone)]
struct Info {
    /// Can match the empty string.
    nullable: bool,
    /// Can match at least one character.
    consumes: bool,
    /// Characters a non-empty match can start with.
    first: CharSet,
    /// Characters a non-empty match can end with.
    last: CharSet,
    /// Deepest nesting of unbounded repetitions.
    height: usize,
    /// Like `height`, counting only repetitions that can give back input.
    open_height: usize,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            nullable: true,
            consumes: false,
            first: CharSet::empty(),
            last: CharSet::empty(),
            height: 0,
            open_height: 0,
        }
    }
}

impl Info {
    fn single(set: CharSet) -> Info {
        Info {
            nullable: false,
            consumes: true,
            first: set.clone(),
            last: set,
            height: 0,
            open_height: 0,
        }
    }

    /// Something that consumes characters we cannot predict.
    fn opaque(nullable: bool, consumes: bool) -> Info {
        let set = if consumes { CharSet::any() } else { CharSet::empty() };
        Info {
            nullable,
            consumes,
            first: set.clone(),
            last: set,
            height: 0,
            open_height: 0,
        }
    }

    fn then(self, next: Info) -> Info {
        let mut first = self.first;
        if self.nullable {
            first.union(&next.first);
        }
        let mut last = next.last;
        if next.nullable {
            last.union(&self.last);
        }
        Info {
            nullable: self.nullable && next.nullable,
            consumes: self.consumes || next.consumes,
            first,
            last,
            height: self.height.max(next.height),
            open_height: self.open_height.max(next.open_height),
        }
    }

    fn or(mut self, other: Info) -> Info {
        self.first.union(&other.first);
        self.last.union(&other.last);
        Info {
            nullable: self.nullable || other.nullable,
            consumes: self.consumes || other.consumes,
            first: self.first,
            last: self.last,
            height: self.height.max(other.height),
            open_height: self.open_height.max(other.open_height),
        }
    }
}

struct Finding {
    hotspot: Hotspot,
    /// The quantifier to rewrite.
    repeat: Option<Span>,
}

/// An enclosing quantifier that can match its target more than once.
#[derive(Debug, Clone, Copy)]
struct Repeat {
    span: Span,
    max: usize,
}

impl Repeat {
    fn is_unbounded(&self) -> bool {
        self.max == Quantifier::UNBOUNDED
    }
}

struct Scan<'r> {
    regex: &'r Regex,
    config: &'r AnalyzerConfig,
    guard: DepthGuard,
    widths: WidthAnalyzer<'r>,
    /// Enclosing quantifiers with a maximum above one, innermost last.
    repeats: Vec<Repeat>,
    /// Capturing groups that sit under a quantifier with a maximum above one.
    repeated_groups: BitSet,
    /// Atomic groups and possessive quantifiers around the current node.
    atomic_depth: usize,
    /// An alternation that is the whole body of the quantifier being visited.
    repeated_alternation: Option<Span>,
    /// Recursion or a subroutine call was found under a repetition.
    opaque: bool,
    findings: Vec<Finding>,
}

impl<'r> Scan<'r> {
    fn new(regex: &'r Regex, config: &'r AnalyzerConfig) -> Scan<'r> {
        Scan {
            regex,
            config,
            guard: DepthGuard::new(config.depth_limit),
            widths: WidthAnalyzer::new(regex),
            repeats: Vec::new(),
            repeated_groups: repeated_groups(regex),
            atomic_depth: 0,
            repeated_alternation: None,
            opaque: false,
            findings: Vec::new(),
        }
    }

    /// Number of enclosing unbounded quantifiers.
    fn loop_depth(&self) -> usize {
        self.repeats.iter().filter(|r| r.is_unbounded()).count()
    }

    /// The innermost enclosing unbounded quantifier.
    fn innermost_loop(&self) -> Option<Span> {
        self.repeats
            .iter()
            .rev()
            .find(|r| r.is_unbounded())
            .map(|r| r.span)
    }

    /// Whether a backreference may point at a group captured more than once.
    fn targets_repeated_group(&self, reference: &GroupRef) -> bool {
        match reference {
            GroupRef::Number(number) | GroupRef::Relative { number, .. } => {
                self.repeated_groups.contains(*number as usize)
            }
            GroupRef::Name(name) => self
                .regex
                .group_names
                .iter()
                .any(|(group, number)| group == name && self.repeated_groups.contains(*number as usize)),
        }
    }

    fn record(
        &mut self,
        kind: HotspotKind,
        span: Span,
        severity: Severity,
        mitigated: bool,
        star_height: usize,
        repeat: Option<Span>,
    ) {
        let severity = if mitigated {
            severity.reduce(MITIGATION)
        } else {
            severity
        };
        trace!(%kind, %severity, mitigated, start = span.start, "hotspot");
        self.findings.push(Finding {
            hotspot: Hotspot {
                kind,
                span,
                severity,
                mitigated,
                fragment: self.regex.fragment(span).to_string(),
                star_height,
            },
            repeat,
        });
    }

    fn check_repetition(&mut self, node: &Quantifier, target: &Info) {
        let mitigated = node.is_possessive() || self.atomic_depth > 0;
        let star_height = target.height + 1;
        if target.height > 0 {
            let severity = if !target.first.intersects(&target.last) {
                Severity::Low
            } else if star_height >= 3 {
                Severity::Critical
            } else {
                Severity::High
            };
            self.record(
                HotspotKind::NestedQuantifier,
                node.span,
                severity,
                mitigated || target.open_height == 0,
                star_height,
                Some(node.span),
            );
        }
        if target.nullable {
            self.record(
                HotspotKind::EmptyRepetition,
                node.span,
                Severity::Medium,
                mitigated,
                star_height,
                Some(node.span),
            );
        }
    }

    fn check_adjacent(&mut self, node: &Sequence, infos: &[Info]) {
        for (i, item) in node.items.iter().enumerate() {
            let head = match repeated(item) {
                Some(q) if infos[i].consumes => q,
                _ => continue,
            };
            for (j, next) in node.items.iter().enumerate().skip(i + 1) {
                if repeated(next).is_some() && infos[i].last.intersects(&infos[j].first) {
                    let severity = if self.loop_depth() == 0 {
                        Severity::Medium
                    } else {
                        Severity::High
                    };
                    self.record(
                        HotspotKind::AdjacentQuantifiers,
                        Span::new(item.start_position(), next.end_position()),
                        severity,
                        head.is_possessive() || self.atomic_depth > 0,
                        self.loop_depth() + 1,
                        Some(head.span),
                    );
                    break;
                }
                if !infos[j].nullable {
                    break;
                }
            }
        }
    }

    fn finish(self, complete: bool) -> ReDoSAnalysis {
        let tripped = !complete || self.guard.tripped();
        let mut findings: Vec<Finding> = self
            .findings
            .into_iter()
            .filter(|f| self.config.report_mitigated || !f.hotspot.mitigated)
            .collect();
        findings.sort_by_key(|f| (f.hotspot.span.start, f.hotspot.span.end));

        let mut severity = findings
            .iter()
            .fold(Severity::Safe, |acc, f| acc.max(f.hotspot.severity));
        if (self.opaque || tripped) && !severity.exceeds_threshold(Severity::Low) {
            severity = Severity::Unknown;
        }

        let weights = &self.config.weights;
        let score = findings
            .iter()
            .map(|f| match f.hotspot.severity {
                Severity::Low => weights.low,
                Severity::Medium => weights.medium,
                Severity::High => weights.high,
                Severity::Critical => weights.critical,
                Severity::Safe | Severity::Unknown => 0,
            })
            .fold(0u32, u32::saturating_add)
            .min(100);

        let top: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.hotspot.severity == severity)
            .collect();
        let vulnerable_offset = match top.as_slice() {
            [only] if severity.exceeds_threshold(Severity::Safe) => Some(only.hotspot.span.start),
            _ => None,
        };

        let unmitigated = |f: &&Finding, level: Severity| {
            !f.hotspot.mitigated && !level.exceeds_threshold(f.hotspot.severity)
        };
        let complexity = if findings.iter().any(|f| {
            unmitigated(&f, Severity::High)
                && matches!(
                    f.hotspot.kind,
                    HotspotKind::NestedQuantifier
                        | HotspotKind::OverlappingAlternation
                        | HotspotKind::BackreferenceLoop
                )
        }) {
            Complexity::Exponential
        } else if findings.iter().any(|f| unmitigated(&f, Severity::Medium)) {
            Complexity::Polynomial
        } else {
            Complexity::Linear
        };

        let recommendations = recommend(self.regex, &findings, self.config.max_recommendations);
        debug!(
            %severity,
            score,
            hotspots = findings.len(),
            %complexity,
            "analyzed pattern"
        );
        ReDoSAnalysis {
            severity,
            score,
            vulnerable_offset,
            recommendations,
            hotspots: findings.into_iter().map(|f| f.hotspot).collect(),
            complexity,
        }
    }
}

/// Numbers of the capturing groups nested in a quantifier with a maximum above one.
fn repeated_groups(regex: &Regex) -> BitSet {
    fn walk(node: &Node, repeated: bool, out: &mut BitSet) {
        let repeated = repeated || matches!(node, Node::Quantifier(q) if q.max > 1);
        if let Node::Group(Group { number: Some(number), .. }) = node {
            if repeated {
                out.insert(*number as usize);
            }
        }
        for child in node.children() {
            walk(child, repeated, out);
        }
    }
    let mut out = BitSet::new();
    walk(&regex.pattern, false, &mut out);
    out
}

/// The unbounded quantifier an item consists of, looking through plain groups.
fn repeated(node: &Node) -> Option<&Quantifier> {
    match node {
        Node::Quantifier(q) if q.is_unbounded() => Some(q),
        Node::Group(g) if !g.kind.is_atomic() && !g.kind.is_lookaround() => repeated(&g.body),
        _ => None,
    }
}

/// The alternation a repeated target consists of, looking through plain groups.
fn direct_alternation(node: &Node) -> Option<Span> {
    match node {
        Node::Alternation(alt) => Some(alt.span),
        Node::Group(g) if !g.kind.is_atomic() && !g.kind.is_lookaround() => direct_alternation(&g.body),
        _ => None,
    }
}

fn find_quantifier(node: &Node, span: Span) -> Option<&Quantifier> {
    if let Node::Quantifier(q) = node {
        if q.span == span {
            return Some(q);
        }
    }
    if !node.span().contains(&span) {
        return None;
    }
    node.children()
        .into_iter()
        .find_map(|child| find_quantifier(child, span))
}

fn recommend(regex: &Regex, findings: &[Finding], limit: usize) -> Vec<Recommendation> {
    let mut ranked: Vec<&Finding> = findings.iter().filter(|f| !f.hotspot.mitigated).collect();
    ranked.sort_by_key(|f| std::cmp::Reverse(f.hotspot.severity.rank()));

    let mut out: Vec<Recommendation> = Vec::new();
    for finding in ranked {
        let span = match finding.repeat {
            Some(span) => span,
            None => continue,
        };
        let quantifier = match find_quantifier(&regex.pattern, span) {
            Some(q) => q,
            None => continue,
        };
        if out.iter().any(|r| r.span == span) {
            continue;
        }
        let original = regex.fragment(span).to_string();
        let node = Node::Quantifier(quantifier.clone());
        match finding.hotspot.kind {
            HotspotKind::NestedQuantifier | HotspotKind::EmptyRepetition => {
                let inner = Node::Quantifier(Quantifier {
                    target: Box::new(MakePossessive.fold_node(&quantifier.target)),
                    ..quantifier.clone()
                });
                out.push(Recommendation {
                    span,
                    original: original.clone(),
                    replacement: print(&inner),
                    message: "make the inner repetition possessive".to_string(),
                });
                out.push(Recommendation {
                    span,
                    original,
                    replacement: print(&WrapAtomic.fold_node(&node)),
                    message: "wrap the repetition in an atomic group".to_string(),
                });
            }
            HotspotKind::OverlappingAlternation | HotspotKind::BackreferenceLoop => {
                out.push(Recommendation {
                    span,
                    original: original.clone(),
                    replacement: print(&MakePossessive.fold_node(&node)),
                    message: "make the repetition possessive".to_string(),
                });
                if quantifier.is_unbounded() {
                    out.push(Recommendation {
                        span,
                        original,
                        replacement: print(&WrapAtomic.fold_node(&node)),
                        message: "wrap the repetition in an atomic group".to_string(),
                    });
                }
            }
            HotspotKind::AdjacentQuantifiers => out.push(Recommendation {
                span: finding.hotspot.span,
                original: finding.hotspot.fragment.clone(),
                replacement: None,
                message: "merge the adjacent repetitions or give them disjoint character sets".to_string(),
            }),
        }
    }
    out.truncate(limit);
    out
}

impl<'r> Visitor for Scan<'r> {
    type Output = Info;

    fn guard(&mut self) -> &mut DepthGuard {
        &mut self.guard
    }

    fn visit_sequence(&mut self, node: &Sequence) -> VisitResult<Info> {
        let mut infos = Vec::with_capacity(node.items.len());
        for item in &node.items {
            infos.push(item.accept(self)?);
        }
        self.check_adjacent(node, &infos);
        Ok(infos.into_iter().fold(Info::default(), Info::then))
    }

    fn visit_alternation(&mut self, node: &Alternation) -> VisitResult<Info> {
        let direct = self.repeated_alternation == Some(node.span);
        let mut infos = Vec::with_capacity(node.branches.len());
        for branch in &node.branches {
            infos.push(branch.accept(self)?);
        }
        if let Some(&repeat) = self.repeats.last() {
            let overlapping = infos.iter().enumerate().any(|(i, a)| {
                infos[i + 1..]
                    .iter()
                    .any(|b| a.consumes && b.consumes && a.first.intersects(&b.first))
            });
            // bounded repetition caps the number of split paths at branches^max
            let severity = match (self.loop_depth() > 0, repeat.max >= LARGE_BOUND, direct) {
                (true, _, true) => Some(Severity::High),
                (true, _, false) | (false, true, true) => Some(Severity::Medium),
                (false, true, false) | (false, false, true) => Some(Severity::Low),
                (false, false, false) => None,
            };
            if let (true, Some(severity)) = (overlapping, severity) {
                let mitigated = self.atomic_depth > 0;
                let height = self.loop_depth();
                self.record(
                    HotspotKind::OverlappingAlternation,
                    node.span,
                    severity,
                    mitigated,
                    height,
                    Some(repeat.span),
                );
            }
        }
        let mut infos = infos.into_iter();
        let first = infos.next().unwrap_or_default();
        Ok(infos.fold(first, Info::or))
    }

    fn visit_group(&mut self, node: &Group) -> VisitResult<Info> {
        let atomic = node.kind.is_atomic();
        if atomic {
            self.atomic_depth += 1;
        }
        let info = node.body.accept(self);
        if atomic {
            self.atomic_depth -= 1;
        }
        let info = info?;
        if node.kind.is_lookaround() {
            // zero width; only non-atomic assertions can be backtracked into
            let height = if atomic { 0 } else { info.height };
            return Ok(Info {
                height,
                open_height: height.min(info.open_height),
                ..Info::default()
            });
        }
        if atomic {
            return Ok(Info { open_height: 0, ..info });
        }
        Ok(info)
    }

    fn visit_quantifier(&mut self, node: &Quantifier) -> VisitResult<Info> {
        if node.max == 0 {
            return Ok(Info::default());
        }
        let unbounded = node.is_unbounded();
        let repeats = node.max > 1;
        let possessive = node.is_possessive();
        let outer_alternation = self.repeated_alternation;
        if repeats {
            self.repeated_alternation = direct_alternation(&node.target);
            self.repeats.push(Repeat {
                span: node.span,
                max: node.max,
            });
        }
        if possessive {
            self.atomic_depth += 1;
        }
        let target = node.target.accept(self);
        if possessive {
            self.atomic_depth -= 1;
        }
        if repeats {
            self.repeats.pop();
        }
        self.repeated_alternation = outer_alternation;
        let target = target?;
        let grows = unbounded && target.consumes;
        if grows {
            self.check_repetition(node, &target);
        }
        Ok(Info {
            nullable: node.min == 0 || target.nullable,
            consumes: target.consumes,
            first: target.first,
            last: target.last,
            height: target.height + usize::from(grows),
            open_height: if possessive {
                0
            } else {
                target.open_height + usize::from(grows)
            },
        })
    }

    fn visit_literal(&mut self, node: &Literal) -> VisitResult<Info> {
        Ok(Info::single(CharSet::char(node.value, node.casei)))
    }

    fn visit_dot(&mut self, node: &Dot) -> VisitResult<Info> {
        let mut set = CharSet::any();
        if !node.dotall {
            set.subtract(&CharSet::char('\n', false));
        }
        Ok(Info::single(set))
    }

    fn visit_shorthand(&mut self, node: &Shorthand) -> VisitResult<Info> {
        Ok(Info::single(charset::shorthand(&node.kind, node.negated)))
    }

    fn visit_char_class(&mut self, node: &CharClass) -> VisitResult<Info> {
        Ok(Info::single(charset::class(node)))
    }

    fn visit_backref(&mut self, node: &Backref) -> VisitResult<Info> {
        let width = self.widths.width(&Node::Backref(node.clone()));
        let repeat = self
            .innermost_loop()
            .filter(|_| self.targets_repeated_group(&node.reference));
        if let Some(repeat) = repeat {
            let severity = if width.max.is_none() {
                Severity::High
            } else {
                Severity::Medium
            };
            let mitigated = self.atomic_depth > 0;
            let height = self.loop_depth();
            self.record(
                HotspotKind::BackreferenceLoop,
                node.span,
                severity,
                mitigated,
                height,
                Some(repeat),
            );
        }
        Ok(Info::opaque(width.is_nullable(), width.max != Some(0)))
    }

    fn visit_subroutine(&mut self, node: &Subroutine) -> VisitResult<Info> {
        if self.loop_depth() > 0 {
            self.opaque = true;
        }
        let width = self.widths.width(&Node::Subroutine(node.clone()));
        Ok(Info::opaque(width.is_nullable(), width.max != Some(0)))
    }

    fn visit_conditional(&mut self, node: &Conditional) -> VisitResult<Info> {
        if let Condition::Assertion(assertion) = &node.condition {
            assertion.accept(self)?;
        }
        let yes = node.yes.accept(self)?;
        let no = match &node.no {
            Some(no) => no.accept(self)?,
            None => Info::default(),
        };
        Ok(yes.or(no))
    }

    fn visit_define(&mut self, node: &Define) -> VisitResult<Info> {
        node.body.accept(self)?;
        Ok(Info::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::parse;

    fn analyze(pattern: &str) -> ReDoSAnalysis {
        RedosAnalyzer::new().analyze(&parse(pattern).unwrap())
    }

    fn kinds(analysis: &ReDoSAnalysis) -> Vec<HotspotKind> {
        analysis.hotspots.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn simple_patterns_are_safe() {
        for pattern in &["/abc/", "/a+b/", "/^[a-z]+@[a-z]+$/", "/(a|b)*c/", "/\\d{1,3}/"] {
            let analysis = analyze(pattern);
            assert_eq!(analysis.severity, Severity::Safe, "{}", pattern);
            assert_eq!(analysis.complexity, Complexity::Linear);
            assert_eq!(analysis.score, 0);
        }
    }

    #[test]
    fn nested_quantifier() {
        let analysis = analyze("/(a+)+$/");
        assert_eq!(kinds(&analysis), vec![HotspotKind::NestedQuantifier]);
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.complexity, Complexity::Exponential);
        assert_eq!(analysis.vulnerable_offset, Some(0));
        assert_eq!(analysis.hotspots[0].fragment, "(a+)+");
        assert_eq!(analysis.hotspots[0].star_height, 2);
    }

    #[test]
    fn deeper_nesting_is_critical() {
        let analysis = analyze("/((a+)+)+$/");
        assert_eq!(analysis.severity, Severity::Critical);
        assert_eq!(analysis.vulnerable_offset, Some(0));
    }

    #[test]
    fn nested_without_overlap_is_low() {
        let analysis = analyze("/(a+b)+/");
        assert_eq!(analysis.severity, Severity::Low);
        assert_eq!(analysis.complexity, Complexity::Linear);
    }

    #[test]
    fn atomic_and_possessive_mitigate() {
        let atomic = analyze("/(?>a+)+$/");
        assert_eq!(atomic.severity, Severity::Low);
        assert!(atomic.hotspots[0].mitigated);
        let possessive = analyze("/(a++)+$/");
        assert_eq!(possessive.severity, Severity::Low);
        let outer = analyze("/(a+)++$/");
        assert_eq!(outer.severity, Severity::Low);
        assert_eq!(outer.complexity, Complexity::Linear);
    }

    #[test]
    fn mitigated_hotspots_can_be_hidden() {
        let config = AnalyzerConfig {
            report_mitigated: false,
            ..AnalyzerConfig::default()
        };
        let analysis = RedosAnalyzer::with_config(config).analyze(&parse("/(?>a+)+$/").unwrap());
        assert!(analysis.hotspots.is_empty());
        assert_eq!(analysis.severity, Severity::Safe);
    }

    #[test]
    fn overlapping_alternation() {
        let analysis = analyze("/^(a|ab)*$/");
        assert_eq!(kinds(&analysis), vec![HotspotKind::OverlappingAlternation]);
        assert_eq!(analysis.severity, Severity::High);
        let nested = analyze("/^(?:x(?:a|ab))*$/");
        assert_eq!(nested.severity, Severity::Medium);
        assert_eq!(analyze("/^(?:a|b)*$/").severity, Severity::Safe);
    }

    #[test]
    fn backreference_loop() {
        let analysis = analyze(r"/(?:(a+)\1)+/");
        assert!(kinds(&analysis).contains(&HotspotKind::BackreferenceLoop));
        assert_eq!(analysis.severity, Severity::High);
        let fixed = analyze(r"/(?:(ab)\1)*/");
        assert_eq!(kinds(&fixed), vec![HotspotKind::BackreferenceLoop]);
        assert_eq!(fixed.severity, Severity::Medium);
        let named = analyze(r"/(?:(?<w>ab)\k<w>)*/");
        assert_eq!(kinds(&named), vec![HotspotKind::BackreferenceLoop]);
    }

    #[test]
    fn repeated_backreference_to_single_capture() {
        let analysis = analyze(r"/(ab)\1*/");
        assert!(analysis.hotspots.is_empty());
        assert_eq!(analysis.severity, Severity::Safe);
        assert_eq!(analyze(r"/(?:(ab)\1){2}/").severity, Severity::Safe);
    }

    #[test]
    fn bounded_alternation_overlap() {
        let analysis = analyze("/(a|aa){1,30}$/");
        assert_eq!(kinds(&analysis), vec![HotspotKind::OverlappingAlternation]);
        assert_eq!(analysis.severity, Severity::Medium);
        assert_eq!(analysis.hotspots[0].star_height, 0);
        let replacements: Vec<Option<&str>> = analysis
            .recommendations
            .iter()
            .map(|r| r.replacement.as_deref())
            .collect();
        assert_eq!(replacements, vec![Some("(a|aa){1,30}+")]);

        assert_eq!(analyze("/(a|ab){2}/").severity, Severity::Low);
        assert_eq!(analyze("/(a|b){1,30}$/").severity, Severity::Safe);
        assert_eq!(analyze("/(?:x(?:a|ab)){2}/").severity, Severity::Safe);
        assert_eq!(analyze("/(?:(a|ab){3})*$/").severity, Severity::High);
    }

    #[test]
    fn empty_repetition() {
        let analysis = analyze("/(a?)*b/");
        assert_eq!(kinds(&analysis), vec![HotspotKind::EmptyRepetition]);
        assert_eq!(analysis.severity, Severity::Medium);
        assert_eq!(analysis.complexity, Complexity::Polynomial);
    }

    #[test]
    fn adjacent_quantifiers() {
        let analysis = analyze(r"/\d+\d+$/");
        assert_eq!(kinds(&analysis), vec![HotspotKind::AdjacentQuantifiers]);
        assert_eq!(analysis.severity, Severity::Medium);
        assert_eq!(analysis.hotspots[0].span, Span::new(0, 6));
        assert!(analyze(r"/\w+\s*\w+$/").hotspots[0].kind == HotspotKind::AdjacentQuantifiers);
        assert_eq!(analyze(r"/a+b+$/").severity, Severity::Safe);
        assert_eq!(analyze(r"/\d+-\d+$/").severity, Severity::Safe);
    }

    #[test]
    fn recursion_under_repetition_is_unknown() {
        let analysis = analyze("/(?:a(?R)?b)*/");
        assert_eq!(analysis.severity, Severity::Unknown);
        assert!(!analysis.exceeds_threshold(Severity::Safe));
        assert_eq!(analyze("/a(?R)?b/").severity, Severity::Safe);
    }

    #[test]
    fn depth_guard_yields_unknown() {
        let config = AnalyzerConfig {
            depth_limit: 3,
            ..AnalyzerConfig::default()
        };
        let regex = parse("/((((a))))/").unwrap();
        let analysis = RedosAnalyzer::with_config(config).analyze(&regex);
        assert_eq!(analysis.severity, Severity::Unknown);
    }

    #[test]
    fn recommendations_rewrite_fragments() {
        let analysis = analyze("/(a+)+$/");
        let replacements: Vec<Option<&str>> = analysis
            .recommendations
            .iter()
            .map(|r| r.replacement.as_deref())
            .collect();
        assert_eq!(replacements, vec![Some("(a++)+"), Some("(?>(a+)+)")]);
        assert_eq!(analysis.recommendations[0].original, "(a+)+");

        let config = AnalyzerConfig {
            max_recommendations: 1,
            ..AnalyzerConfig::default()
        };
        let limited = RedosAnalyzer::with_config(config).analyze(&parse("/(a+)+$/").unwrap());
        assert_eq!(limited.recommendations.len(), 1);
    }

    #[test]
    fn score_is_capped() {
        let analysis = analyze("/(a+)+(b+)+(c+)+(d+)+(e+)+$/");
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.vulnerable_offset, None);
    }
}
