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

//! Rendering an AST back to pattern text.
//!
//! The output is normalized rather than a copy of the source: backreferences
//! always use the braced `\g{n}` form, code escapes use their braced forms,
//! and characters that would be special in their position are escaped.
//! Re-parsing printed text and printing again yields the same text.

use std::fmt::Write;

use crate::ast::*;
use crate::config::DEFAULT_DEPTH_LIMIT;
use crate::error::VisitResult;
use crate::flags::modifier_letters;
use crate::parse::closing_delimiter;
use crate::visit::{DepthGuard, Visitor};

/// A visitor producing pattern text.
#[derive(Debug)]
pub struct Printer {
    guard: DepthGuard,
    in_class: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Printer::new()
    }
}

impl Printer {
    /// A printer deep enough for any tree the parser accepts.
    pub fn new() -> Printer {
        Printer::with_depth_limit(DEFAULT_DEPTH_LIMIT * 4)
    }

    /// A printer that gives up below `limit` levels.
    pub fn with_depth_limit(limit: usize) -> Printer {
        Printer {
            guard: DepthGuard::new(limit),
            in_class: false,
        }
    }

    /// Render a single node.
    pub fn print(&mut self, node: &Node) -> VisitResult<String> {
        node.accept(self)
    }

    fn push_char(&self, out: &mut String, c: char, form: LiteralForm) {
        match form {
            LiteralForm::Verbatim => {
                if self.in_class && matches!(c, ']' | '^' | '-' | '[' | '&') {
                    out.push('\\');
                }
                out.push(c);
            }
            LiteralForm::Punctuation => {
                out.push('\\');
                out.push(c);
            }
            LiteralForm::Special => match special_letter(c, self.in_class) {
                Some(letter) => {
                    out.push('\\');
                    out.push(letter);
                }
                None => push_hex(out, c),
            },
            LiteralForm::Control => {
                let value = c as u32;
                match char::from_u32(value ^ 0x40).filter(|_| value < 0x80) {
                    Some(letter) => {
                        out.push_str("\\c");
                        out.push(letter);
                    }
                    None => push_hex(out, c),
                }
            }
            LiteralForm::Octal => {
                let _ = write!(out, "\\o{{{:o}}}", c as u32);
            }
            LiteralForm::Hex => push_hex(out, c),
            LiteralForm::CodePoint => {
                let _ = write!(out, "\\N{{U+{:X}}}", c as u32);
            }
            LiteralForm::Quoted => {
                if c.is_alphanumeric() || (!c.is_ascii() && !c.is_whitespace()) {
                    out.push(c);
                } else if c.is_whitespace() || c.is_control() {
                    push_hex(out, c);
                } else {
                    out.push('\\');
                    out.push(c);
                }
            }
        }
    }

    fn class_char(&self, c: char) -> String {
        let mut out = String::new();
        // range endpoints lose their form; escape what is not plain
        if c.is_alphanumeric() || (c.is_ascii_punctuation() && !matches!(c, ']' | '^' | '-' | '[' | '&' | '\\')) {
            out.push(c);
        } else if c.is_ascii_punctuation() {
            out.push('\\');
            out.push(c);
        } else {
            push_hex(&mut out, c);
        }
        out
    }

    fn group_prefix(kind: &GroupKind, name: Option<&str>) -> String {
        match kind {
            GroupKind::Capturing => "(".to_string(),
            GroupKind::NonCapturing => "(?:".to_string(),
            GroupKind::Named => format!("(?<{}>", name.unwrap_or_default()),
            GroupKind::Atomic => "(?>".to_string(),
            GroupKind::Lookahead => "(?=".to_string(),
            GroupKind::NegativeLookahead => "(?!".to_string(),
            GroupKind::Lookbehind => "(?<=".to_string(),
            GroupKind::NegativeLookbehind => "(?<!".to_string(),
            GroupKind::NonAtomicLookahead => "(*napla:".to_string(),
            GroupKind::NonAtomicLookbehind => "(*naplb:".to_string(),
            GroupKind::BranchReset => "(?|".to_string(),
            GroupKind::Modifiers(modifiers) => format!("(?{}:", modifiers.to_letters()),
        }
    }

    fn children(&mut self, nodes: &[Node], separator: &str) -> VisitResult<String> {
        let mut out = String::new();
        for (ix, node) in nodes.iter().enumerate() {
            if ix > 0 {
                out.push_str(separator);
            }
            out.push_str(&node.accept(self)?);
        }
        Ok(out)
    }
}

fn push_hex(out: &mut String, c: char) {
    let _ = write!(out, "\\x{{{:x}}}", c as u32);
}

fn special_letter(c: char, in_class: bool) -> Option<char> {
    match c {
        '\x07' => Some('a'),
        '\x1b' => Some('e'),
        '\x0c' => Some('f'),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\t' => Some('t'),
        '\x08' if in_class => Some('b'),
        _ => None,
    }
}

fn quantifier_suffix(min: usize, max: usize, kind: QuantifierKind) -> String {
    let mut out = match (min, max) {
        (0, Quantifier::UNBOUNDED) => "*".to_string(),
        (1, Quantifier::UNBOUNDED) => "+".to_string(),
        (0, 1) => "?".to_string(),
        (min, Quantifier::UNBOUNDED) => format!("{{{},}}", min),
        (min, max) if min == max => format!("{{{}}}", min),
        (min, max) => format!("{{{},{}}}", min, max),
    };
    match kind {
        QuantifierKind::Greedy => {}
        QuantifierKind::Lazy => out.push('?'),
        QuantifierKind::Possessive => out.push('+'),
    }
    out
}

fn group_ref(reference: &GroupRef) -> String {
    match reference {
        GroupRef::Number(number) => number.to_string(),
        GroupRef::Relative { offset, .. } => format!("{:+}", offset),
        GroupRef::Name(name) => name.clone(),
    }
}

impl Visitor for Printer {
    type Output = String;

    fn guard(&mut self) -> &mut DepthGuard {
        &mut self.guard
    }

    fn visit_sequence(&mut self, node: &Sequence) -> VisitResult<String> {
        self.children(&node.items, "")
    }

    fn visit_alternation(&mut self, node: &Alternation) -> VisitResult<String> {
        self.children(&node.branches, "|")
    }

    fn visit_group(&mut self, node: &Group) -> VisitResult<String> {
        let mut out = Printer::group_prefix(&node.kind, node.name.as_deref());
        out.push_str(&node.body.accept(self)?);
        out.push(')');
        Ok(out)
    }

    fn visit_quantifier(&mut self, node: &Quantifier) -> VisitResult<String> {
        let target = node.target.accept(self)?;
        let wrap = matches!(
            node.target.as_ref(),
            Node::Sequence(_) | Node::Alternation(_) | Node::Empty(_)
        );
        let mut out = if wrap { format!("(?:{})", target) } else { target };
        out.push_str(&quantifier_suffix(node.min, node.max, node.kind));
        Ok(out)
    }

    fn visit_literal(&mut self, node: &Literal) -> VisitResult<String> {
        let mut out = String::new();
        self.push_char(&mut out, node.value, node.form);
        Ok(out)
    }

    fn visit_dot(&mut self, _node: &Dot) -> VisitResult<String> {
        Ok(".".to_string())
    }

    fn visit_shorthand(&mut self, node: &Shorthand) -> VisitResult<String> {
        let letter = match &node.kind {
            ShorthandKind::Property(name) => {
                let p = if node.negated { 'P' } else { 'p' };
                return Ok(format!("\\{}{{{}}}", p, name));
            }
            ShorthandKind::Digit => 'd',
            ShorthandKind::Word => 'w',
            ShorthandKind::Space => 's',
            ShorthandKind::HorizontalSpace => 'h',
            ShorthandKind::VerticalSpace => 'v',
            ShorthandKind::Newline => 'R',
            ShorthandKind::NotNewline => 'N',
            ShorthandKind::Grapheme => 'X',
            ShorthandKind::CodeUnit => 'C',
        };
        let letter = if node.negated {
            letter.to_ascii_uppercase()
        } else {
            letter
        };
        Ok(format!("\\{}", letter))
    }

    fn visit_char_class(&mut self, node: &CharClass) -> VisitResult<String> {
        let outer = self.in_class;
        self.in_class = true;
        let expr = node.expr.accept(self);
        self.in_class = outer;
        Ok(format!("[{}{}]", if node.negated { "^" } else { "" }, expr?))
    }

    fn visit_range(&mut self, node: &Range) -> VisitResult<String> {
        Ok(format!("{}-{}", self.class_char(node.start), self.class_char(node.end)))
    }

    fn visit_class_operation(&mut self, node: &ClassOperation) -> VisitResult<String> {
        let separator = match node.op {
            ClassOp::Union => "",
            ClassOp::Intersection => "&&",
            ClassOp::Subtraction => "--",
        };
        self.children(&node.operands, separator)
    }

    fn visit_posix_class(&mut self, node: &PosixClass) -> VisitResult<String> {
        Ok(format!("[:{}{}:]", if node.negated { "^" } else { "" }, node.name))
    }

    fn visit_backref(&mut self, node: &Backref) -> VisitResult<String> {
        Ok(match &node.reference {
            GroupRef::Name(name) => format!("\\k<{}>", name),
            reference => format!("\\g{{{}}}", group_ref(reference)),
        })
    }

    fn visit_conditional(&mut self, node: &Conditional) -> VisitResult<String> {
        let mut out = match &node.condition {
            Condition::Assertion(assertion) => format!("(?{}", assertion.accept(self)?),
            Condition::Group(GroupRef::Name(name)) => format!("(?(<{}>)", name),
            Condition::Group(reference) => format!("(?({})", group_ref(reference)),
            Condition::Recursion => "(?(R)".to_string(),
            Condition::RecursionGroup(number) => format!("(?(R{})", number),
            Condition::RecursionName(name) => format!("(?(R&{})", name),
        };
        out.push_str(&node.yes.accept(self)?);
        if let Some(no) = &node.no {
            out.push('|');
            out.push_str(&no.accept(self)?);
        }
        out.push(')');
        Ok(out)
    }

    fn visit_define(&mut self, node: &Define) -> VisitResult<String> {
        Ok(format!("(?(DEFINE){})", node.body.accept(self)?))
    }

    fn visit_subroutine(&mut self, node: &Subroutine) -> VisitResult<String> {
        Ok(match &node.target {
            SubroutineTarget::Recursive => "(?R)".to_string(),
            SubroutineTarget::Group(number) => format!("(?{})", number),
            SubroutineTarget::Relative { offset, .. } => format!("(?{:+})", offset),
            SubroutineTarget::Named(name) => format!("(?&{})", name),
        })
    }

    fn visit_anchor(&mut self, node: &Anchor) -> VisitResult<String> {
        Ok(match node.kind {
            AnchorKind::Start => "^",
            AnchorKind::End => "$",
            AnchorKind::WordBoundary => "\\b",
            AnchorKind::NotWordBoundary => "\\B",
            AnchorKind::StartText => "\\A",
            AnchorKind::EndText => "\\z",
            AnchorKind::EndTextOptionalNewline => "\\Z",
            AnchorKind::ContinueFromPreviousMatchEnd => "\\G",
            AnchorKind::KeepOut => "\\K",
        }
        .to_string())
    }

    fn visit_inline_flags(&mut self, node: &InlineFlags) -> VisitResult<String> {
        Ok(format!("(?{})", node.modifiers.to_letters()))
    }

    fn visit_verb(&mut self, node: &Verb) -> VisitResult<String> {
        Ok(match &node.arg {
            Some(arg) if node.name.starts_with("LIMIT_") => format!("(*{}={})", node.name, arg),
            Some(arg) => format!("(*{}:{})", node.name, arg),
            None => format!("(*{})", node.name),
        })
    }

    fn visit_callout(&mut self, node: &Callout) -> VisitResult<String> {
        Ok(match &node.arg {
            CalloutArg::Number(number) => format!("(?C{})", number),
            CalloutArg::Text(text) => format!("(?C\"{}\")", text.replace('"', "\"\"")),
        })
    }

    fn visit_comment(&mut self, node: &Comment) -> VisitResult<String> {
        Ok(format!("(?#{})", node.text))
    }
}

/// Render a node as pattern text, or `None` if it is nested too deeply.
pub fn print(node: &Node) -> Option<String> {
    Printer::new().print(node).ok()
}

impl Regex {
    /// The pattern body rendered from the tree.
    ///
    /// Falls back to the original source if the tree is too deep to print.
    pub fn to_body(&self) -> String {
        print(&self.pattern).unwrap_or_else(|| self.source.clone())
    }

    /// The full literal: delimiters, rendered body and modifiers.
    pub fn to_pattern(&self) -> String {
        let mut out = String::new();
        out.push(self.delimiter);
        out.push_str(&self.to_body());
        out.push(closing_delimiter(self.delimiter));
        out.push_str(&modifier_letters(self.flags));
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;

    fn reprint(pattern: &str) -> String {
        parse(pattern).unwrap().to_pattern()
    }

    #[test]
    fn plain_patterns_print_as_written() {
        for pattern in &[
            "/a+b/",
            "/(a|b)*?c{2,3}/i",
            "/^(?:x|y)+$/m",
            "/(?<year>\\d{4})-(?=\\w)/",
            "#[^a-z_]#",
            "/(?>a++)(?|(b)|(c))/",
        ] {
            assert_eq!(reprint(pattern), *pattern);
        }
    }

    #[test]
    fn references_are_normalized() {
        assert_eq!(reprint(r"/(a)\1/"), r"/(a)\g{1}/");
        assert_eq!(reprint(r"/(?<n>a)(?P=n)/"), r"/(?<n>a)\k<n>/");
        assert_eq!(reprint(r"/(a)\g{-1}/"), r"/(a)\g{-1}/");
        assert_eq!(reprint(r"/(a)(?-1)(?R)/"), r"/(a)(?-1)(?R)/");
    }

    #[test]
    fn escapes_are_normalized() {
        assert_eq!(reprint(r"/\x41\101\cA\t/"), r"/\x{41}\o{101}\cA\t/");
        assert_eq!(reprint(r"/\Qa.b\E/"), r"/a\.b/");
        assert_eq!(reprint(r"/[\b\]]/"), r"/[\b\]]/");
    }

    #[test]
    fn conditionals_and_verbs() {
        assert_eq!(reprint("/(a)?(?(1)b|c)/"), "/(a)?(?(1)b|c)/");
        assert_eq!(reprint("/(?(?=x)xy|z)/"), "/(?(?=x)xy|z)/");
        assert_eq!(reprint("/(*LIMIT_MATCH=10)a(*SKIP)(*:m)/"), "/(*LIMIT_MATCH=10)a(*SKIP)(*:m)/");
        assert_eq!(reprint("/(?C1)(?C\"a\"\"b\")(?#note)/"), "/(?C1)(?C\"a\"\"b\")(?#note)/");
    }

    #[test]
    fn bracket_delimiters_close() {
        assert_eq!(reprint("{a{2}}s"), "{a{2}}s");
        assert_eq!(reprint("(a)"), "(a)");
    }

    #[test]
    fn printing_is_stable() {
        let once = reprint(r"/[\w.-]+@(?i:[a-z]{2,})\z/u");
        assert_eq!(reprint(&once), once);
    }
}
