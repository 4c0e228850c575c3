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

//! Match length bounds.
//!
//! Widths are counted in characters. Backreferences take the width of the
//! group they refer to, and anything reached through recursion is treated as
//! unbounded.

use std::collections::HashMap;

use bit_set::BitSet;

use crate::ast::*;

/// Minimum and maximum number of characters a node can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width {
    /// Shortest possible match.
    pub min: usize,
    /// Longest possible match, `None` when unbounded.
    pub max: Option<usize>,
}

impl Width {
    /// Matches nothing but the empty string.
    pub const ZERO: Width = Width {
        min: 0,
        max: Some(0),
    };

    /// Exactly `n` characters.
    pub fn exact(n: usize) -> Width {
        Width { min: n, max: Some(n) }
    }

    /// At least `min` characters with no upper bound.
    pub fn unbounded(min: usize) -> Width {
        Width { min, max: None }
    }

    /// Whether the node can match the empty string.
    pub fn is_nullable(&self) -> bool {
        self.min == 0
    }

    /// Whether every match has the same length.
    pub fn is_fixed(&self) -> bool {
        self.max == Some(self.min)
    }

    /// Concatenation.
    pub fn then(self, other: Width) -> Width {
        Width {
            min: self.min.saturating_add(other.min),
            max: match (self.max, other.max) {
                (Some(a), Some(b)) => a.checked_add(b),
                _ => None,
            },
        }
    }

    /// Alternation.
    pub fn or(self, other: Width) -> Width {
        Width {
            min: self.min.min(other.min),
            max: match (self.max, other.max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
        }
    }

    /// Repetition between `min` and `max` times.
    pub fn repeat(self, min: usize, max: usize) -> Width {
        let upper = match self.max {
            Some(0) => Some(0),
            _ if max == Quantifier::UNBOUNDED => None,
            Some(m) => m.checked_mul(max),
            None if max == 0 => Some(0),
            None => None,
        };
        Width {
            min: self.min.saturating_mul(min),
            max: upper,
        }
    }
}

/// Computes widths with knowledge of the groups in a pattern.
pub struct WidthAnalyzer<'r> {
    groups: HashMap<u32, &'r Group>,
    names: &'r [(String, u32)],
    pattern: &'r Node,
    active: BitSet,
    in_root: bool,
}

impl<'r> WidthAnalyzer<'r> {
    /// Index the groups of `regex`.
    pub fn new(regex: &'r Regex) -> WidthAnalyzer<'r> {
        let mut groups = HashMap::new();
        collect_groups(&regex.pattern, &mut groups);
        WidthAnalyzer {
            groups,
            names: &regex.group_names,
            pattern: &regex.pattern,
            active: BitSet::new(),
            in_root: false,
        }
    }

    /// The capture group with `number`, if it exists.
    pub fn group(&self, number: u32) -> Option<&'r Group> {
        self.groups.get(&number).copied()
    }

    /// Width of the body of group `number`.
    pub fn group_width(&mut self, number: u32) -> Width {
        match self.group(number) {
            Some(group) => self.through_group(number, &group.body),
            None => Width::unbounded(0),
        }
    }

    fn through_group(&mut self, number: u32, body: &Node) -> Width {
        let ix = number as usize;
        if self.active.contains(ix) {
            return Width::unbounded(0);
        }
        self.active.insert(ix);
        let width = self.width(body);
        self.active.remove(ix);
        width
    }

    fn named_width(&mut self, name: &str) -> Width {
        let numbers: Vec<u32> = self
            .names
            .iter()
            .filter(|(group, _)| group == name)
            .map(|(_, number)| *number)
            .collect();
        let mut widths = numbers.into_iter().map(|number| self.group_width(number));
        match widths.next() {
            Some(first) => widths.fold(first, Width::or),
            None => Width::unbounded(0),
        }
    }

    fn reference_width(&mut self, reference: &GroupRef) -> Width {
        match reference {
            GroupRef::Number(number) | GroupRef::Relative { number, .. } => self.group_width(*number),
            GroupRef::Name(name) => self.named_width(name),
        }
    }

    /// Width of `node`.
    pub fn width(&mut self, node: &Node) -> Width {
        match node {
            Node::Empty(_)
            | Node::Anchor(_)
            | Node::InlineFlags(_)
            | Node::Verb(_)
            | Node::Callout(_)
            | Node::Comment(_)
            | Node::Define(_) => Width::ZERO,
            Node::Literal(_)
            | Node::Dot(_)
            | Node::CharClass(_)
            | Node::Range(_)
            | Node::ClassOperation(_)
            | Node::PosixClass(_) => Width::exact(1),
            Node::Shorthand(x) => match x.kind {
                ShorthandKind::Newline => Width { min: 1, max: Some(2) },
                ShorthandKind::Grapheme => Width::unbounded(1),
                _ => Width::exact(1),
            },
            Node::Sequence(x) => x
                .items
                .iter()
                .fold(Width::ZERO, |acc, item| acc.then(self.width(item))),
            Node::Alternation(x) => {
                let mut branches = x.branches.iter();
                match branches.next() {
                    Some(first) => {
                        let first = self.width(first);
                        branches.fold(first, |acc, b| acc.or(self.width(b)))
                    }
                    None => Width::ZERO,
                }
            }
            Node::Group(x) if x.kind.is_lookaround() => Width::ZERO,
            Node::Group(x) => match x.number {
                Some(number) => self.through_group(number, &x.body),
                None => self.width(&x.body),
            },
            Node::Quantifier(x) => self.width(&x.target).repeat(x.min, x.max),
            Node::Backref(x) => self.reference_width(&x.reference),
            Node::Subroutine(x) => match &x.target {
                SubroutineTarget::Recursive => self.root_width(),
                SubroutineTarget::Group(number) | SubroutineTarget::Relative { number, .. } => {
                    self.group_width(*number)
                }
                SubroutineTarget::Named(name) => self.named_width(name),
            },
            Node::Conditional(x) => {
                let yes = self.width(&x.yes);
                let no = x.no.as_ref().map_or(Width::ZERO, |no| self.width(no));
                yes.or(no)
            }
        }
    }

    fn root_width(&mut self) -> Width {
        if self.in_root {
            return Width::unbounded(0);
        }
        let pattern = self.pattern;
        self.in_root = true;
        let width = self.width(pattern);
        self.in_root = false;
        width
    }
}

fn collect_groups<'r>(node: &'r Node, groups: &mut HashMap<u32, &'r Group>) {
    if let Node::Group(group) = node {
        if let Some(number) = group.number {
            // with branch reset the first group carrying a number wins
            groups.entry(number).or_insert(group);
        }
    }
    for child in node.children() {
        collect_groups(child, groups);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn body_width(pattern: &str) -> Width {
        let regex = parse(pattern).unwrap();
        WidthAnalyzer::new(&regex).width(&regex.pattern)
    }

    #[test]
    fn fixed_and_bounded() {
        assert_eq!(body_width("/abc/"), Width::exact(3));
        assert_eq!(body_width("/a{2,4}b?/"), Width { min: 2, max: Some(5) });
        assert_eq!(body_width("/ab|c/"), Width { min: 1, max: Some(2) });
    }

    #[test]
    fn unbounded_and_nullable() {
        let w = body_width("/a+/");
        assert_eq!(w, Width::unbounded(1));
        assert!(body_width("/a*|b/").is_nullable());
        assert_eq!(body_width("/(?=abc)/"), Width::ZERO);
    }

    #[test]
    fn backref_takes_group_width() {
        assert_eq!(body_width(r"/(ab)\1/"), Width::exact(4));
        assert_eq!(body_width(r"/(?<x>a|bc)\k<x>/"), Width { min: 2, max: Some(4) });
    }

    #[test]
    fn recursion_is_unbounded() {
        assert_eq!(body_width(r"/a(?R)?/").max, None);
        assert_eq!(body_width(r"/(a(?1)?b)/").max, None);
    }

    #[test]
    fn repeat_of_empty_stays_empty() {
        assert_eq!(Width::ZERO.repeat(0, Quantifier::UNBOUNDED), Width::ZERO);
        assert_eq!(Width::exact(2).repeat(3, 3), Width::exact(6));
    }
}
