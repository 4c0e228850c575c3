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

//! Character sets for overlap analysis.
//!
//! Sets are interval lists backed by `regex-syntax`'s [`ClassUnicode`]. They
//! approximate what a node can match: `\d`, `\w` and `\s` use their ASCII
//! meaning, and Unicode properties the `regex-syntax` tables do not know
//! fall back to the full range so that overlaps are never missed.

use regex_syntax::hir::{self, ClassUnicode, ClassUnicodeRange, HirKind};

use crate::ast::*;

/// A set of Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    class: ClassUnicode,
}

impl Default for CharSet {
    fn default() -> Self {
        CharSet::empty()
    }
}

impl CharSet {
    /// The empty set.
    pub fn empty() -> CharSet {
        CharSet {
            class: ClassUnicode::empty(),
        }
    }

    /// Every scalar value.
    pub fn any() -> CharSet {
        CharSet::range('\0', char::MAX)
    }

    /// The scalar values from `start` to `end` inclusive.
    pub fn range(start: char, end: char) -> CharSet {
        CharSet {
            class: ClassUnicode::new([ClassUnicodeRange::new(start, end)]),
        }
    }

    /// A single character, case folded when `casei` is set.
    pub fn char(c: char, casei: bool) -> CharSet {
        let mut set = CharSet::range(c, c);
        if casei {
            set.fold_case();
        }
        set
    }

    fn from_ranges(ranges: &[(char, char)]) -> CharSet {
        CharSet {
            class: ClassUnicode::new(ranges.iter().map(|&(a, b)| ClassUnicodeRange::new(a, b))),
        }
    }

    /// Add the simple case variants of every member.
    pub fn fold_case(&mut self) {
        if self.class.try_case_fold_simple().is_err() {
            // without case tables, fold ASCII only
            let mut extra = ClassUnicode::empty();
            for range in self.class.ranges() {
                for c in range.start()..=range.end().min('\x7f') {
                    if c.is_ascii_alphabetic() {
                        let other = if c.is_ascii_lowercase() {
                            c.to_ascii_uppercase()
                        } else {
                            c.to_ascii_lowercase()
                        };
                        extra.push(ClassUnicodeRange::new(other, other));
                    }
                }
            }
            self.class.union(&extra);
        }
    }

    /// Members of either set.
    pub fn union(&mut self, other: &CharSet) {
        self.class.union(&other.class);
    }

    /// Members of both sets.
    pub fn intersect(&mut self, other: &CharSet) {
        self.class.intersect(&other.class);
    }

    /// Members of `self` not in `other`.
    pub fn subtract(&mut self, other: &CharSet) {
        self.class.difference(&other.class);
    }

    /// The complement.
    pub fn negate(&mut self) {
        self.class.negate();
    }

    /// Whether the sets share a member.
    pub fn intersects(&self, other: &CharSet) -> bool {
        let mut both = self.class.clone();
        both.intersect(&other.class);
        !both.ranges().is_empty()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.class.ranges().is_empty()
    }

    /// Whether `c` is a member.
    pub fn contains(&self, c: char) -> bool {
        self.class
            .ranges()
            .iter()
            .any(|range| range.start() <= c && c <= range.end())
    }

    /// The member intervals in ascending order.
    pub fn ranges(&self) -> impl Iterator<Item = (char, char)> + '_ {
        self.class.ranges().iter().map(|range| (range.start(), range.end()))
    }

    fn negated(mut self, negated: bool) -> CharSet {
        if negated {
            self.negate();
        }
        self
    }
}

const HORIZONTAL_SPACE: &[(char, char)] = &[
    ('\t', '\t'),
    (' ', ' '),
    ('\u{a0}', '\u{a0}'),
    ('\u{1680}', '\u{1680}'),
    ('\u{180e}', '\u{180e}'),
    ('\u{2000}', '\u{200a}'),
    ('\u{202f}', '\u{202f}'),
    ('\u{205f}', '\u{205f}'),
    ('\u{3000}', '\u{3000}'),
];

const VERTICAL_SPACE: &[(char, char)] = &[('\n', '\r'), ('\u{85}', '\u{85}'), ('\u{2028}', '\u{2029}')];

/// The set matched by a shorthand escape.
///
/// For `\R` and `\X`, which can match more than one character, this is the
/// set of characters a match can start with.
pub fn shorthand(kind: &ShorthandKind, negated: bool) -> CharSet {
    let set = match kind {
        ShorthandKind::Digit => CharSet::range('0', '9'),
        ShorthandKind::Word => CharSet::from_ranges(&[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')]),
        ShorthandKind::Space => CharSet::from_ranges(&[('\t', '\r'), (' ', ' ')]),
        ShorthandKind::HorizontalSpace => CharSet::from_ranges(HORIZONTAL_SPACE),
        ShorthandKind::VerticalSpace | ShorthandKind::Newline => CharSet::from_ranges(VERTICAL_SPACE),
        ShorthandKind::NotNewline => CharSet::char('\n', false).negated(true),
        ShorthandKind::Grapheme | ShorthandKind::CodeUnit => CharSet::any(),
        ShorthandKind::Property(name) => property(name),
    };
    set.negated(negated)
}

/// The set of a Unicode property, or everything when the name is unknown.
pub fn property(name: &str) -> CharSet {
    // PCRE spells "any letter with case" L& where regex-syntax wants LC
    let name = match name {
        "L&" => "LC",
        "Any" => return CharSet::any(),
        other => other,
    };
    translate(&format!("\\p{{{}}}", name)).unwrap_or_else(CharSet::any)
}

/// The set of a POSIX class name such as `alpha`.
pub fn posix(name: &str, negated: bool) -> CharSet {
    translate(&format!("[[:{}:]]", name))
        .unwrap_or_else(CharSet::any)
        .negated(negated)
}

fn translate(pattern: &str) -> Option<CharSet> {
    let hir = regex_syntax::parse(pattern).ok()?;
    match hir.kind() {
        HirKind::Class(hir::Class::Unicode(class)) => Some(CharSet { class: class.clone() }),
        _ => None,
    }
}

/// The set matched by a character class, including its negation.
pub fn class(node: &CharClass) -> CharSet {
    let mut set = class_member(&node.expr, node.casei);
    if node.casei {
        set.fold_case();
    }
    set.negated(node.negated)
}

fn class_member(node: &Node, casei: bool) -> CharSet {
    match node {
        Node::Literal(x) => CharSet::char(x.value, casei),
        Node::Range(x) => CharSet::range(x.start, x.end),
        Node::Shorthand(x) => shorthand(&x.kind, x.negated),
        Node::PosixClass(x) => posix(&x.name, x.negated),
        Node::ClassOperation(x) => {
            let mut operands = x.operands.iter().map(|operand| class_member(operand, casei));
            let mut set = operands.next().unwrap_or_default();
            for operand in operands {
                match x.op {
                    ClassOp::Union => set.union(&operand),
                    ClassOp::Intersection => set.intersect(&operand),
                    ClassOp::Subtraction => set.subtract(&operand),
                }
            }
            set
        }
        Node::CharClass(x) => class(x),
        _ => CharSet::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn first_class(pattern: &str) -> CharSet {
        let regex = parse(pattern).unwrap();
        match regex.pattern.as_ref() {
            Node::CharClass(c) => class(c),
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn set_algebra() {
        let mut lower = CharSet::range('a', 'z');
        let digits = CharSet::range('0', '9');
        assert!(!lower.intersects(&digits));
        lower.union(&digits);
        assert!(lower.contains('5'));
        lower.subtract(&CharSet::range('0', '4'));
        assert!(!lower.contains('3'));
        lower.negate();
        assert!(lower.contains('3'));
        assert!(!lower.contains('q'));
    }

    #[test]
    fn case_folding() {
        let set = CharSet::char('k', true);
        assert!(set.contains('K'));
        assert!(!CharSet::char('k', false).contains('K'));
    }

    #[test]
    fn shorthands() {
        assert!(shorthand(&ShorthandKind::Word, false).contains('_'));
        assert!(shorthand(&ShorthandKind::Digit, true).contains('x'));
        assert!(shorthand(&ShorthandKind::HorizontalSpace, false).contains('\u{3000}'));
        assert!(!shorthand(&ShorthandKind::NotNewline, false).contains('\n'));
    }

    #[test]
    fn properties_and_posix() {
        assert!(property("Greek").contains('α'));
        assert!(!property("Greek").contains('a'));
        assert!(property("NoSuchProperty").contains('a'));
        assert!(posix("digit", false).contains('7'));
        assert!(!posix("alpha", true).contains('q'));
    }

    #[test]
    fn classes() {
        let set = first_class("/[^a-z_]/");
        assert!(set.contains('A'));
        assert!(!set.contains('_'));
        let set = first_class("/[A-C]/i");
        assert!(set.contains('b'));
    }

    #[test]
    fn set_operations_in_classes() {
        let regex = crate::Parser::new()
            .dialect(crate::config::Dialect::Pcre2_10_45)
            .parse("/[a-z--aeiou]/")
            .unwrap();
        match regex.pattern.as_ref() {
            Node::CharClass(c) => {
                let set = class(c);
                assert!(set.contains('b'));
                assert!(!set.contains('e'));
            }
            other => panic!("expected class, got {:?}", other),
        }
    }
}
