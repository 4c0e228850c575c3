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

use pcre_audit::ast::*;
use pcre_audit::visit::walk_children;
use pcre_audit::{DepthGuard, Fold, MakePossessive, VisitError, VisitResult, Visitor, WrapAtomic};

mod common;

/// Counts capturing groups and the deepest quantifier nesting.
struct Stats {
    guard: DepthGuard,
    depth: usize,
    captures: usize,
    max_quantifier_depth: usize,
}

impl Stats {
    fn new() -> Stats {
        Stats {
            guard: DepthGuard::new(64),
            depth: 0,
            captures: 0,
            max_quantifier_depth: 0,
        }
    }
}

impl Visitor for Stats {
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
        walk_children(&Node::Alternation(node.clone()), self)?;
        Ok(())
    }

    fn visit_group(&mut self, node: &Group) -> VisitResult<()> {
        if node.kind.is_capturing() {
            self.captures += 1;
        }
        node.body.accept(self)
    }

    fn visit_quantifier(&mut self, node: &Quantifier) -> VisitResult<()> {
        self.depth += 1;
        self.max_quantifier_depth = self.max_quantifier_depth.max(self.depth);
        let result = node.target.accept(self);
        self.depth -= 1;
        result
    }
}

#[test]
fn test_custom_visitor() {
    let regex = common::regex("/(a(b)+|(?:c)*)+(?<n>d)/");
    let mut stats = Stats::new();
    regex.accept(&mut stats).unwrap();
    assert_eq!(stats.captures, 3);
    assert_eq!(stats.max_quantifier_depth, 2);
}

#[test]
fn test_depth_guard_fails_closed() {
    let regex = common::regex(&format!("/{}a{}/", "(?:".repeat(100), ")".repeat(100)));
    let mut stats = Stats::new();
    match regex.accept(&mut stats) {
        Err(VisitError::DepthExceeded { limit, .. }) => assert_eq!(limit, 64),
        other => panic!("expected depth error, got {:?}", other),
    }
}

#[test]
fn test_positions_are_exposed() {
    let regex = common::regex("/xy(z+)/");
    assert_eq!((regex.start_position(), regex.end_position()), (0, 6));
    match regex.pattern.as_ref() {
        Node::Sequence(seq) => {
            let last = &seq.items[2];
            assert_eq!((last.start_position(), last.end_position()), (2, 6));
        }
        other => panic!("expected sequence, got {:?}", other),
    }
}

#[test]
fn test_folds_rebuild_with_spans() {
    let regex = common::regex("/(a+)+b/");
    let possessive = MakePossessive.fold_regex(&regex);
    assert_eq!(possessive.to_body(), "(a++)++b");
    assert_eq!(possessive.pattern.span(), regex.pattern.span());
    assert_eq!(regex.to_body(), "(a+)+b");

    let atomic = WrapAtomic.fold_regex(&regex);
    assert_eq!(atomic.to_body(), "(?>(a+)+)b");
    assert!(!pcre_audit::analyze_redos(&atomic).exceeds_threshold(pcre_audit::Severity::Low));
}
