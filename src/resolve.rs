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

//! Reference resolution and semantic checks.
//!
//! Runs over a freshly parsed tree once all groups are known, so forward
//! references are accepted. Checks that backreferences, subroutine calls and
//! conditions name existing groups, and that lookbehinds have a length the
//! selected dialect can handle.

use bit_set::BitSet;
use tracing::trace;

use crate::ast::*;
use crate::config::ParserConfig;
use crate::error::{ErrorKind, ParseError, Result, VisitError, VisitResult};
use crate::visit::{DepthGuard, Visitor};
use crate::width::WidthAnalyzer;

/// Validates references and lookbehinds of a parsed pattern.
pub struct Resolver<'r> {
    regex: &'r Regex,
    config: &'r ParserConfig,
    groups: BitSet,
    widths: WidthAnalyzer<'r>,
    references: usize,
    error: Option<ParseError>,
    guard: DepthGuard,
}

impl<'r> Resolver<'r> {
    /// Create a resolver for `regex`.
    pub fn new(regex: &'r Regex, config: &'r ParserConfig) -> Resolver<'r> {
        let mut groups = BitSet::new();
        for number in 1..=regex.capture_count {
            groups.insert(number as usize);
        }
        Resolver {
            regex,
            config,
            groups,
            widths: WidthAnalyzer::new(regex),
            references: 0,
            error: None,
            // groups, sequences, quantifiers and alternations nest per level
            guard: DepthGuard::new(config.nest_limit.saturating_mul(4).saturating_add(16)),
        }
    }

    /// Check `regex`, returning the first error found.
    pub fn resolve(regex: &'r Regex, config: &'r ParserConfig) -> Result<()> {
        let mut resolver = Resolver::new(regex, config);
        if let Err(VisitError::DepthExceeded { limit, offset }) = regex.accept(&mut resolver) {
            return Err(ParseError::new(
                ErrorKind::NestingTooDeep,
                format!("pattern is nested more than {} levels deep", limit),
                &regex.source,
                offset,
            ));
        }
        if let Some(err) = resolver.error {
            return Err(err);
        }
        trace!(references = resolver.references, "resolved references");
        Ok(())
    }

    fn fail(&mut self, kind: ErrorKind, message: String, offset: usize) {
        if self.error.is_none() {
            self.error = Some(ParseError::new(kind, message, &self.regex.source, offset));
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.regex.group_names.iter().any(|(group, _)| group == name)
    }

    /// Check that a group reference names an existing group.
    fn check_reference(&mut self, reference: &GroupRef, kind: ErrorKind, offset: usize) {
        match reference {
            GroupRef::Number(0) => {
                self.fail(kind, "a numbered reference must not be zero".to_string(), offset);
            }
            GroupRef::Number(number) | GroupRef::Relative { number, .. } => {
                if !self.groups.contains(*number as usize) {
                    self.fail(
                        kind,
                        format!("reference to non-existent group {}", number),
                        offset,
                    );
                }
            }
            GroupRef::Name(name) => {
                if !self.has_name(name) {
                    self.fail(
                        kind,
                        format!("reference to non-existent group named '{}'", name),
                        offset,
                    );
                }
            }
        }
    }

    fn check_lookbehind(&mut self, group: &Group) {
        let width = self.widths.width(&group.body);
        let dialect = self.config.dialect;
        let max = match width.max {
            Some(max) => max,
            None if self.config.allow_unbounded_lookbehind => return,
            None => {
                self.fail(
                    ErrorKind::UnboundedLookbehind,
                    "lookbehind assertion is not fixed length".to_string(),
                    group.span.start,
                );
                return;
            }
        };
        if !dialect.supports_variable_lookbehind() {
            // older releases allow top-level alternatives of differing
            // fixed lengths, but each alternative must be fixed
            let branches: Vec<&Node> = match group.body.as_ref() {
                Node::Alternation(alt) => alt.branches.iter().collect(),
                other => vec![other],
            };
            for branch in branches {
                if !self.widths.width(branch).is_fixed() {
                    self.fail(
                        ErrorKind::VariableLookbehind,
                        "lookbehind assertion is not fixed length".to_string(),
                        group.span.start,
                    );
                    return;
                }
            }
        }
        if dialect.supports_variable_lookbehind() && !width.is_fixed() && max > self.config.max_lookbehind {
            self.fail(
                ErrorKind::LookbehindTooLong,
                format!(
                    "lookbehind is too complicated: {} characters exceeds the maximum of {}",
                    max, self.config.max_lookbehind
                ),
                group.span.start,
            );
        }
    }
}

impl<'r> Visitor for Resolver<'r> {
    type Output = ();

    fn guard(&mut self) -> &mut DepthGuard {
        &mut self.guard
    }

    fn visit_sequence(&mut self, node: &Sequence) -> VisitResult<()> {
        for item in &node.items {
            item.accept(self)?;
        }
        Ok(())
    }

    fn visit_alternation(&mut self, node: &Alternation) -> VisitResult<()> {
        for branch in &node.branches {
            branch.accept(self)?;
        }
        Ok(())
    }

    fn visit_group(&mut self, node: &Group) -> VisitResult<()> {
        if node.kind.is_lookbehind() {
            self.check_lookbehind(node);
        }
        node.body.accept(self)
    }

    fn visit_quantifier(&mut self, node: &Quantifier) -> VisitResult<()> {
        node.target.accept(self)
    }

    fn visit_char_class(&mut self, node: &CharClass) -> VisitResult<()> {
        node.expr.accept(self)
    }

    fn visit_class_operation(&mut self, node: &ClassOperation) -> VisitResult<()> {
        for operand in &node.operands {
            operand.accept(self)?;
        }
        Ok(())
    }

    fn visit_backref(&mut self, node: &Backref) -> VisitResult<()> {
        self.references += 1;
        self.check_reference(&node.reference, ErrorKind::UnresolvedBackref, node.span.start);
        Ok(())
    }

    fn visit_subroutine(&mut self, node: &Subroutine) -> VisitResult<()> {
        self.references += 1;
        let reference = match &node.target {
            SubroutineTarget::Recursive => return Ok(()),
            SubroutineTarget::Group(number) => GroupRef::Number(*number),
            SubroutineTarget::Relative { offset, number } => GroupRef::Relative {
                offset: *offset,
                number: *number,
            },
            SubroutineTarget::Named(name) => GroupRef::Name(name.clone()),
        };
        self.check_reference(&reference, ErrorKind::UnresolvedSubroutine, node.span.start);
        Ok(())
    }

    fn visit_conditional(&mut self, node: &Conditional) -> VisitResult<()> {
        let offset = node.span.start;
        match &node.condition {
            Condition::Group(reference) => {
                self.check_reference(reference, ErrorKind::UnresolvedBackref, offset);
            }
            Condition::RecursionGroup(number) => {
                self.check_reference(&GroupRef::Number(*number), ErrorKind::UnresolvedSubroutine, offset);
            }
            Condition::RecursionName(name) => {
                self.check_reference(&GroupRef::Name(name.clone()), ErrorKind::UnresolvedSubroutine, offset);
            }
            Condition::Recursion | Condition::Assertion(_) => {}
        }
        if let Condition::Assertion(assertion) = &node.condition {
            assertion.accept(self)?;
        }
        node.yes.accept(self)?;
        match &node.no {
            Some(no) => no.accept(self),
            None => Ok(()),
        }
    }

    fn visit_define(&mut self, node: &Define) -> VisitResult<()> {
        node.body.accept(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;
    use crate::Parser;

    fn resolve(pattern: &str) -> Result<()> {
        let regex = crate::parse(pattern)?;
        Resolver::resolve(&regex, &ParserConfig::default())
    }

    #[test]
    fn existing_targets_resolve() {
        assert!(resolve(r"/(a)(b)\2/").is_ok());
        assert!(resolve(r"/(?<n>a)\k<n>(?&n)(?P>n)/").is_ok());
        assert!(resolve(r"/(a)(?(1)b|c)(?(R1)d)/").is_ok());
    }

    #[test]
    fn forward_references_are_fine() {
        assert!(resolve(r"/(?:\2|(a)(b))+/").is_ok());
        assert!(resolve(r"/(?1)(a)/").is_ok());
    }

    #[test]
    fn subroutines_and_recursion() {
        assert!(resolve(r"/(a|b(?1))(?R)?/").is_ok());
        assert!(resolve(r"/(a)(?-1)(?+1)(b)/").is_ok());
    }

    #[test]
    fn missing_targets() {
        assert_eq!(resolve(r"/(a)\k<b>/").unwrap_err().kind, ErrorKind::UnresolvedBackref);
        assert_eq!(resolve(r"/(a)(?2)/").unwrap_err().kind, ErrorKind::UnresolvedSubroutine);
        assert_eq!(resolve(r"/(?(2)a|b)(c)/").unwrap_err().kind, ErrorKind::UnresolvedBackref);
    }

    #[test]
    fn lookbehind_rules_follow_dialect() {
        let alternatives = r"/(?<=ab|c)x/";
        assert!(resolve(alternatives).is_ok());

        let variable = r"/(?<=ab?)x/";
        assert!(resolve(variable).is_ok());
        let err = Parser::new()
            .dialect(Dialect::Pcre2_10_34)
            .parse(variable)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::VariableLookbehind);
    }

    #[test]
    fn lookbehind_limits() {
        let err = Parser::new().max_lookbehind(3).parse("/(?<=abc?d)x/").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LookbehindTooLong);
        assert!(Parser::new().max_lookbehind(3).parse("/(?<=abcd)x/").is_ok());
        assert!(Parser::new()
            .allow_unbounded_lookbehind(true)
            .parse("/(?<=a+)b/")
            .is_ok());
    }
}
