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

//! Traversal and rewriting over the AST.
//!
//! [`Visitor`] is a double-dispatch interface: [`Node::accept`] matches on the
//! variant and calls the corresponding `visit_*` method. Nothing recurses on
//! its own; a visitor that wants to see children calls `accept` on them, and
//! every `accept` goes through the visitor's [`DepthGuard`] so that runaway
//! trees fail with [`VisitError::DepthExceeded`] instead of overflowing the
//! stack.
//!
//! [`Fold`] rebuilds a tree. The default methods copy each node with its
//! original span, so a fold only overrides the variants it changes.

use crate::ast::*;
use crate::error::{VisitError, VisitResult};

/// Bounds the recursion depth of a traversal.
#[derive(Debug, Clone)]
pub struct DepthGuard {
    limit: usize,
    depth: usize,
    tripped: bool,
}

impl DepthGuard {
    /// A guard that allows at most `limit` nested `accept` calls.
    pub fn new(limit: usize) -> DepthGuard {
        DepthGuard {
            limit,
            depth: 0,
            tripped: false,
        }
    }

    /// Enter a node starting at `offset`.
    pub fn enter(&mut self, offset: usize) -> VisitResult<()> {
        if self.depth >= self.limit {
            self.tripped = true;
            return Err(VisitError::DepthExceeded {
                limit: self.limit,
                offset,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave the current node.
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the limit was hit at any point.
    pub fn tripped(&self) -> bool {
        self.tripped
    }
}

/// A traversal over the AST, one method per node variant.
///
/// Every method defaults to `Ok(Self::Output::default())` without looking at
/// children.
pub trait Visitor {
    /// What each visit produces.
    type Output: Default;

    /// The guard bounding this traversal.
    fn guard(&mut self) -> &mut DepthGuard;

    /// Entry point for a whole pattern; visits the body by default.
    fn visit_regex(&mut self, regex: &Regex) -> VisitResult<Self::Output> {
        regex.pattern.accept(self)
    }

    /// An empty branch or body.
    fn visit_empty(&mut self, _node: &Empty) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// Items matched one after another.
    fn visit_sequence(&mut self, _node: &Sequence) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// Branches separated by `|`.
    fn visit_alternation(&mut self, _node: &Alternation) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// Any parenthesized group, lookarounds included.
    fn visit_group(&mut self, _node: &Group) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A repeated subpattern.
    fn visit_quantifier(&mut self, _node: &Quantifier) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A single literal character, however it was spelled.
    fn visit_literal(&mut self, _node: &Literal) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// The `.` metacharacter.
    fn visit_dot(&mut self, _node: &Dot) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// An escape such as `\d` or `\R`.
    fn visit_shorthand(&mut self, _node: &Shorthand) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A bracketed class, `[...]`.
    fn visit_char_class(&mut self, _node: &CharClass) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A range inside a class, `a-z`.
    fn visit_range(&mut self, _node: &Range) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A class set operation, `&&` or `--`.
    fn visit_class_operation(&mut self, _node: &ClassOperation) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A POSIX class inside a class, `[:alpha:]`.
    fn visit_posix_class(&mut self, _node: &PosixClass) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A backreference.
    fn visit_backref(&mut self, _node: &Backref) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A conditional group, `(?(cond)yes|no)`.
    fn visit_conditional(&mut self, _node: &Conditional) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A `(?(DEFINE)...)` block.
    fn visit_define(&mut self, _node: &Define) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A subroutine call or recursion.
    fn visit_subroutine(&mut self, _node: &Subroutine) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// An anchor or other zero-width escape.
    fn visit_anchor(&mut self, _node: &Anchor) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// Inline modifiers that apply to the rest of the group.
    fn visit_inline_flags(&mut self, _node: &InlineFlags) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A backtracking control verb.
    fn visit_verb(&mut self, _node: &Verb) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A callout, `(?C...)`.
    fn visit_callout(&mut self, _node: &Callout) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }

    /// A `(?#...)` comment.
    fn visit_comment(&mut self, _node: &Comment) -> VisitResult<Self::Output> {
        Ok(Self::Output::default())
    }
}

impl Node {
    /// Dispatch to the visitor method for this variant.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> VisitResult<V::Output> {
        visitor.guard().enter(self.start_position())?;
        let result = match self {
            Node::Empty(x) => visitor.visit_empty(x),
            Node::Sequence(x) => visitor.visit_sequence(x),
            Node::Alternation(x) => visitor.visit_alternation(x),
            Node::Group(x) => visitor.visit_group(x),
            Node::Quantifier(x) => visitor.visit_quantifier(x),
            Node::Literal(x) => visitor.visit_literal(x),
            Node::Dot(x) => visitor.visit_dot(x),
            Node::Shorthand(x) => visitor.visit_shorthand(x),
            Node::CharClass(x) => visitor.visit_char_class(x),
            Node::Range(x) => visitor.visit_range(x),
            Node::ClassOperation(x) => visitor.visit_class_operation(x),
            Node::PosixClass(x) => visitor.visit_posix_class(x),
            Node::Backref(x) => visitor.visit_backref(x),
            Node::Conditional(x) => visitor.visit_conditional(x),
            Node::Define(x) => visitor.visit_define(x),
            Node::Subroutine(x) => visitor.visit_subroutine(x),
            Node::Anchor(x) => visitor.visit_anchor(x),
            Node::InlineFlags(x) => visitor.visit_inline_flags(x),
            Node::Verb(x) => visitor.visit_verb(x),
            Node::Callout(x) => visitor.visit_callout(x),
            Node::Comment(x) => visitor.visit_comment(x),
        };
        visitor.guard().exit();
        result
    }
}

impl Regex {
    /// Run a visitor over the whole pattern.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> VisitResult<V::Output> {
        visitor.visit_regex(self)
    }
}

/// Accept every direct child of `node` in source order.
pub fn walk_children<V: Visitor + ?Sized>(node: &Node, visitor: &mut V) -> VisitResult<Vec<V::Output>> {
    node.children()
        .into_iter()
        .map(|child| child.accept(visitor))
        .collect()
}

/// A rebuilding transformation.
///
/// Each `fold_*` returns a new node carrying the span of the node it
/// replaces.
pub trait Fold {
    /// Rebuild a whole pattern, keeping its metadata.
    fn fold_regex(&mut self, regex: &Regex) -> Regex {
        Regex {
            span: regex.span,
            delimiter: regex.delimiter,
            flags: regex.flags,
            source: regex.source.clone(),
            pattern: Box::new(self.fold_node(&regex.pattern)),
            capture_count: regex.capture_count,
            group_names: regex.group_names.clone(),
            warnings: regex.warnings.clone(),
        }
    }

    /// Dispatch on the variant of `node`.
    fn fold_node(&mut self, node: &Node) -> Node {
        match node {
            Node::Sequence(x) => self.fold_sequence(x),
            Node::Alternation(x) => self.fold_alternation(x),
            Node::Group(x) => self.fold_group(x),
            Node::Quantifier(x) => self.fold_quantifier(x),
            Node::CharClass(x) => self.fold_char_class(x),
            Node::Conditional(x) => self.fold_conditional(x),
            Node::Define(x) => self.fold_define(x),
            leaf => self.fold_leaf(leaf),
        }
    }

    /// Rebuild each item.
    fn fold_sequence(&mut self, node: &Sequence) -> Node {
        Node::Sequence(Sequence {
            span: node.span,
            items: node.items.iter().map(|item| self.fold_node(item)).collect(),
        })
    }

    /// Rebuild each branch.
    fn fold_alternation(&mut self, node: &Alternation) -> Node {
        Node::Alternation(Alternation {
            span: node.span,
            branches: node.branches.iter().map(|b| self.fold_node(b)).collect(),
        })
    }

    /// Rebuild the group body.
    fn fold_group(&mut self, node: &Group) -> Node {
        Node::Group(Group {
            span: node.span,
            kind: node.kind.clone(),
            name: node.name.clone(),
            number: node.number,
            body: Box::new(self.fold_node(&node.body)),
        })
    }

    /// Rebuild the repeated target.
    fn fold_quantifier(&mut self, node: &Quantifier) -> Node {
        Node::Quantifier(Quantifier {
            span: node.span,
            target: Box::new(self.fold_node(&node.target)),
            min: node.min,
            max: node.max,
            kind: node.kind,
        })
    }

    /// Classes are copied whole by default; their members are not rewritten.
    fn fold_char_class(&mut self, node: &CharClass) -> Node {
        Node::CharClass(node.clone())
    }

    /// Rebuild the condition assertion and both branches.
    fn fold_conditional(&mut self, node: &Conditional) -> Node {
        let condition = match &node.condition {
            Condition::Assertion(assertion) => Condition::Assertion(Box::new(self.fold_node(assertion))),
            other => other.clone(),
        };
        Node::Conditional(Conditional {
            span: node.span,
            condition,
            yes: Box::new(self.fold_node(&node.yes)),
            no: node.no.as_ref().map(|no| Box::new(self.fold_node(no))),
        })
    }

    /// Rebuild the definitions.
    fn fold_define(&mut self, node: &Define) -> Node {
        Node::Define(Define {
            span: node.span,
            body: Box::new(self.fold_node(&node.body)),
        })
    }

    /// Nodes without children are cloned.
    fn fold_leaf(&mut self, node: &Node) -> Node {
        node.clone()
    }
}

/// Turns every greedy quantifier into a possessive one.
#[derive(Debug, Default)]
pub struct MakePossessive;

impl Fold for MakePossessive {
    fn fold_quantifier(&mut self, node: &Quantifier) -> Node {
        let kind = match node.kind {
            QuantifierKind::Greedy => QuantifierKind::Possessive,
            other => other,
        };
        Node::Quantifier(Quantifier {
            span: node.span,
            target: Box::new(self.fold_node(&node.target)),
            min: node.min,
            max: node.max,
            kind,
        })
    }
}

/// Wraps every outermost backtracking unbounded quantifier in an atomic group.
///
/// Quantifiers already inside an atomic group or lookaround are left alone.
#[derive(Debug, Default)]
pub struct WrapAtomic;

impl Fold for WrapAtomic {
    fn fold_group(&mut self, node: &Group) -> Node {
        if node.kind.is_atomic() {
            return Node::Group(node.clone());
        }
        Node::Group(Group {
            span: node.span,
            kind: node.kind.clone(),
            name: node.name.clone(),
            number: node.number,
            body: Box::new(self.fold_node(&node.body)),
        })
    }

    fn fold_quantifier(&mut self, node: &Quantifier) -> Node {
        if !node.is_unbounded() || node.is_possessive() {
            return Node::Quantifier(Quantifier {
                span: node.span,
                target: Box::new(self.fold_node(&node.target)),
                min: node.min,
                max: node.max,
                kind: node.kind,
            });
        }
        Node::Group(Group {
            span: node.span,
            kind: GroupKind::Atomic,
            name: None,
            number: None,
            body: Box::new(Node::Quantifier(node.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(c: char, at: usize) -> Node {
        Node::Literal(Literal {
            span: Span::new(at, at + 1),
            value: c,
            form: LiteralForm::Verbatim,
            casei: false,
        })
    }

    fn plus(target: Node, end: usize) -> Node {
        let start = target.start_position();
        Node::Quantifier(Quantifier {
            span: Span::new(start, end),
            target: Box::new(target),
            min: 1,
            max: Quantifier::UNBOUNDED,
            kind: QuantifierKind::Greedy,
        })
    }

    struct CountLiterals {
        guard: DepthGuard,
    }

    impl Visitor for CountLiterals {
        type Output = usize;

        fn guard(&mut self) -> &mut DepthGuard {
            &mut self.guard
        }

        fn visit_sequence(&mut self, node: &Sequence) -> VisitResult<usize> {
            let mut total = 0;
            for item in &node.items {
                total += item.accept(self)?;
            }
            Ok(total)
        }

        fn visit_quantifier(&mut self, node: &Quantifier) -> VisitResult<usize> {
            node.target.accept(self)
        }

        fn visit_literal(&mut self, _node: &Literal) -> VisitResult<usize> {
            Ok(1)
        }
    }

    #[test]
    fn dispatch_reaches_overridden_methods() {
        let tree = Node::Sequence(Sequence {
            span: Span::new(0, 3),
            items: vec![plus(lit('a', 0), 2), lit('b', 2)],
        });
        let mut counter = CountLiterals {
            guard: DepthGuard::new(16),
        };
        assert_eq!(tree.accept(&mut counter).unwrap(), 2);
        assert_eq!(counter.guard.depth(), 0);
    }

    #[test]
    fn unvisited_variants_use_the_default() {
        let tree = Node::Dot(Dot {
            span: Span::new(0, 1),
            dotall: false,
        });
        let mut counter = CountLiterals {
            guard: DepthGuard::new(16),
        };
        assert_eq!(tree.accept(&mut counter).unwrap(), 0);
    }

    #[test]
    fn guard_fails_closed() {
        let mut node = lit('a', 0);
        for _ in 0..100 {
            node = plus(node, 1);
        }
        let mut counter = CountLiterals {
            guard: DepthGuard::new(50),
        };
        let err = node.accept(&mut counter).unwrap_err();
        assert_eq!(err, VisitError::DepthExceeded { limit: 50, offset: 0 });
        assert!(counter.guard.tripped());
    }

    #[test]
    fn possessive_fold_keeps_spans() {
        let tree = plus(lit('a', 0), 2);
        let folded = MakePossessive.fold_node(&tree);
        match folded {
            Node::Quantifier(q) => {
                assert_eq!(q.kind, QuantifierKind::Possessive);
                assert_eq!(q.span, Span::new(0, 2));
            }
            other => panic!("expected quantifier, got {:?}", other),
        }
    }

    #[test]
    fn atomic_fold_wraps_outermost_only() {
        let tree = plus(plus(lit('a', 0), 2), 3);
        match WrapAtomic.fold_node(&tree) {
            Node::Group(g) => {
                assert_eq!(g.kind, GroupKind::Atomic);
                assert_eq!(*g.body, tree);
            }
            other => panic!("expected atomic group, got {:?}", other),
        }
    }
}
