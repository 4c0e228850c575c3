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

//! AST types for parsed patterns.
//!
//! The tree is a closed set of node variants. Every node records the
//! `[start, end)` byte span of the pattern body it was parsed from, and nodes
//! are never mutated after construction: transformations build new nodes and
//! carry the original span forward (see [`crate::visit::Fold`]).

use serde::Serialize;

use crate::flags::FlagModifiers;

/// A byte range in the pattern body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    /// An empty span at `offset`.
    pub fn empty(offset: usize) -> Span {
        Span::new(offset, offset)
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The smallest span covering both.
    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// The root of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Regex {
    /// Span of the whole body.
    pub span: Span,
    /// The opening delimiter, e.g. `/` or `{`.
    pub delimiter: char,
    /// Modifier flags given after the closing delimiter.
    pub flags: u32,
    /// The pattern body.
    pub source: String,
    /// The parsed body.
    pub pattern: Box<Node>,
    /// Highest capture group number assigned.
    pub capture_count: u32,
    /// Named groups with their numbers, in order of definition.
    pub group_names: Vec<(String, u32)>,
    /// Lint-level findings made while parsing.
    pub warnings: Vec<Warning>,
}

impl Regex {
    /// Byte offset of the first byte of the body.
    pub fn start_position(&self) -> usize {
        self.span.start
    }

    /// Byte offset one past the last byte of the body.
    pub fn end_position(&self) -> usize {
        self.span.end
    }

    /// Look up the number of a named group.
    pub fn group_number(&self, name: &str) -> Option<u32> {
        self.group_names
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, number)| *number)
    }

    /// The body text covered by `span`.
    pub fn fragment(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or("")
    }
}

/// A lint-level finding recorded while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Category.
    pub kind: WarningKind,
    /// Human readable description.
    pub message: String,
    /// Where in the body it applies.
    pub span: Span,
}

/// Categories of parse warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// An inline flag that does not change the flags already in effect.
    RedundantFlag,
    /// An inline setting that both sets and unsets the same flag.
    ConflictingFlag,
    /// A start-of-pattern setting such as `(*UTF)` that appears later.
    MisplacedSetting,
}

/// A single node of the pattern AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Node {
    /// The empty expression, e.g. one side of `a|`.
    Empty(Empty),
    /// Concatenation.
    Sequence(Sequence),
    /// `|`-separated alternatives.
    Alternation(Alternation),
    /// Any parenthesized group.
    Group(Group),
    /// Repetition of a target node.
    Quantifier(Quantifier),
    /// A single character.
    Literal(Literal),
    /// `.`
    Dot(Dot),
    /// Escapes like `\d`, `\h`, `\R` and Unicode properties.
    Shorthand(Shorthand),
    /// `[...]`
    CharClass(CharClass),
    /// `a-z` inside a class.
    Range(Range),
    /// Union, intersection or subtraction of class members.
    ClassOperation(ClassOperation),
    /// `[:alpha:]` inside a class.
    PosixClass(PosixClass),
    /// A backreference.
    Backref(Backref),
    /// `(?(cond)yes|no)`
    Conditional(Conditional),
    /// `(?(DEFINE)...)`
    Define(Define),
    /// Recursion or a subroutine call.
    Subroutine(Subroutine),
    /// A zero-width positional assertion.
    Anchor(Anchor),
    /// An unscoped inline flag setting, `(?i)`.
    InlineFlags(InlineFlags),
    /// A backtracking control verb or start-of-pattern setting.
    Verb(Verb),
    /// `(?C...)`
    Callout(Callout),
    /// `(?#...)`
    Comment(Comment),
}

impl Node {
    /// The span of this node.
    pub fn span(&self) -> Span {
        match self {
            Node::Empty(x) => x.span,
            Node::Sequence(x) => x.span,
            Node::Alternation(x) => x.span,
            Node::Group(x) => x.span,
            Node::Quantifier(x) => x.span,
            Node::Literal(x) => x.span,
            Node::Dot(x) => x.span,
            Node::Shorthand(x) => x.span,
            Node::CharClass(x) => x.span,
            Node::Range(x) => x.span,
            Node::ClassOperation(x) => x.span,
            Node::PosixClass(x) => x.span,
            Node::Backref(x) => x.span,
            Node::Conditional(x) => x.span,
            Node::Define(x) => x.span,
            Node::Subroutine(x) => x.span,
            Node::Anchor(x) => x.span,
            Node::InlineFlags(x) => x.span,
            Node::Verb(x) => x.span,
            Node::Callout(x) => x.span,
            Node::Comment(x) => x.span,
        }
    }

    /// Byte offset of the first byte of this node.
    pub fn start_position(&self) -> usize {
        self.span().start
    }

    /// Byte offset one past the last byte of this node.
    pub fn end_position(&self) -> usize {
        self.span().end
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Sequence(x) => x.items.iter().collect(),
            Node::Alternation(x) => x.branches.iter().collect(),
            Node::Group(x) => vec![&x.body],
            Node::Quantifier(x) => vec![&x.target],
            Node::CharClass(x) => vec![&x.expr],
            Node::ClassOperation(x) => x.operands.iter().collect(),
            Node::Conditional(x) => {
                let mut children = Vec::with_capacity(3);
                if let Condition::Assertion(assertion) = &x.condition {
                    children.push(assertion.as_ref());
                }
                children.push(&x.yes);
                if let Some(no) = &x.no {
                    children.push(no);
                }
                children
            }
            Node::Define(x) => vec![&x.body],
            _ => Vec::new(),
        }
    }

    /// Whether this node can never consume input.
    pub fn is_zero_width(&self) -> bool {
        match self {
            Node::Empty(_)
            | Node::Anchor(_)
            | Node::InlineFlags(_)
            | Node::Verb(_)
            | Node::Callout(_)
            | Node::Comment(_)
            | Node::Define(_) => true,
            Node::Group(group) => group.kind.is_lookaround(),
            _ => false,
        }
    }
}

/// The empty expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Empty {
    /// Where the empty expression sits.
    pub span: Span,
}

/// A concatenation of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sequence {
    /// The span of this sequence.
    pub span: Span,
    /// The concatenated nodes, in order.
    pub items: Vec<Node>,
}

/// An alternation of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternation {
    /// The span of this alternation, excluding enclosing parentheses.
    pub span: Span,
    /// The alternatives, in order.
    pub branches: Vec<Node>,
}

/// The kind of a parenthesized group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    /// `(...)`
    Capturing,
    /// `(?:...)`
    NonCapturing,
    /// `(?<name>...)`, `(?'name'...)` or `(?P<name>...)`
    Named,
    /// `(?>...)`
    Atomic,
    /// `(?=...)`
    Lookahead,
    /// `(?!...)`
    NegativeLookahead,
    /// `(?<=...)`
    Lookbehind,
    /// `(?<!...)`
    NegativeLookbehind,
    /// `(*napla:...)`
    NonAtomicLookahead,
    /// `(*naplb:...)`
    NonAtomicLookbehind,
    /// `(?|...)`
    BranchReset,
    /// `(?i-s:...)`
    Modifiers(FlagModifiers),
}

impl GroupKind {
    /// Whether this group records a capture.
    pub fn is_capturing(&self) -> bool {
        matches!(self, GroupKind::Capturing | GroupKind::Named)
    }

    /// Whether this group is a zero-width lookaround assertion.
    pub fn is_lookaround(&self) -> bool {
        self.is_lookahead() || self.is_lookbehind()
    }

    /// Whether this group looks ahead.
    pub fn is_lookahead(&self) -> bool {
        matches!(
            self,
            GroupKind::Lookahead | GroupKind::NegativeLookahead | GroupKind::NonAtomicLookahead
        )
    }

    /// Whether this group looks behind.
    pub fn is_lookbehind(&self) -> bool {
        matches!(
            self,
            GroupKind::Lookbehind | GroupKind::NegativeLookbehind | GroupKind::NonAtomicLookbehind
        )
    }

    /// Whether the engine commits to the first match found inside the group.
    ///
    /// Atomic groups and all standard lookarounds behave atomically in PCRE.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            GroupKind::Atomic
                | GroupKind::Lookahead
                | GroupKind::NegativeLookahead
                | GroupKind::Lookbehind
                | GroupKind::NegativeLookbehind
        )
    }
}

/// A parenthesized group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// The span from `(` to `)` inclusive.
    pub span: Span,
    /// What kind of group this is.
    pub kind: GroupKind,
    /// The name, for named groups.
    pub name: Option<String>,
    /// The capture number, for capturing groups.
    pub number: Option<u32>,
    /// The group content.
    pub body: Box<Node>,
}

/// Greediness of a quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuantifierKind {
    /// Match as much as possible, backtracking as needed.
    Greedy,
    /// Match as little as possible.
    Lazy,
    /// Match as much as possible and never give it back.
    Possessive,
}

/// A repetition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantifier {
    /// The span of target and quantifier together.
    pub span: Span,
    /// The repeated node.
    pub target: Box<Node>,
    /// Minimum repetitions.
    pub min: usize,
    /// Maximum repetitions, [`Quantifier::UNBOUNDED`] for no limit.
    pub max: usize,
    /// Greediness.
    pub kind: QuantifierKind,
}

impl Quantifier {
    /// Sentinel for `max` meaning "no upper bound".
    pub const UNBOUNDED: usize = usize::MAX;

    /// Whether this quantifier has no upper bound.
    pub fn is_unbounded(&self) -> bool {
        self.max == Quantifier::UNBOUNDED
    }

    /// Whether this quantifier never gives back what it matched.
    pub fn is_possessive(&self) -> bool {
        self.kind == QuantifierKind::Possessive
    }
}

/// How a literal was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LiteralForm {
    /// Written verbatim, e.g. `a`.
    Verbatim,
    /// An escaped punctuation character, e.g. `\*`.
    Punctuation,
    /// A special escape like `\n`, `\t` or `\e`.
    Special,
    /// A control escape, `\cX`.
    Control,
    /// An octal escape, `\101` or `\o{101}`.
    Octal,
    /// A hex escape, `\x41` or `\x{41}`.
    Hex,
    /// A code point escape, `\N{U+41}`.
    CodePoint,
    /// Inside `\Q...\E`.
    Quoted,
}

/// A single literal character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    /// The span of the literal as written.
    pub span: Span,
    /// The decoded character.
    pub value: char,
    /// How it was written.
    pub form: LiteralForm,
    /// Whether case-insensitive matching was in effect.
    pub casei: bool,
}

/// Any character, `.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dot {
    /// The span of the dot.
    pub span: Span,
    /// Whether it matches newlines (the `s` flag).
    pub dotall: bool,
}

/// The family of a shorthand escape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ShorthandKind {
    /// `\d`
    Digit,
    /// `\w`
    Word,
    /// `\s`
    Space,
    /// `\h`
    HorizontalSpace,
    /// `\v`
    VerticalSpace,
    /// `\R`, any newline sequence.
    Newline,
    /// `\N`, any character but newline.
    NotNewline,
    /// `\X`, an extended grapheme cluster.
    Grapheme,
    /// `\C`, a single code unit.
    CodeUnit,
    /// `\p{...}`
    Property(String),
}

/// A shorthand class escape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shorthand {
    /// The span of the escape.
    pub span: Span,
    /// Which class.
    pub kind: ShorthandKind,
    /// Whether negated, e.g. `\D` or `\P{L}`.
    pub negated: bool,
}

/// A bracketed character class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharClass {
    /// The span from `[` to `]` inclusive.
    pub span: Span,
    /// Whether the class starts with `^`.
    pub negated: bool,
    /// Whether case-insensitive matching was in effect.
    pub casei: bool,
    /// The member expression: a [`ClassOperation`], or a single member.
    pub expr: Box<Node>,
}

/// A character range inside a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    /// The span from the first endpoint to the last.
    pub span: Span,
    /// Lower endpoint.
    pub start: char,
    /// Upper endpoint.
    pub end: char,
}

/// Set operations between class members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassOp {
    /// Members listed side by side.
    Union,
    /// `&&`
    Intersection,
    /// `--`
    Subtraction,
}

/// A set operation inside a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassOperation {
    /// The span of all operands.
    pub span: Span,
    /// Which operation.
    pub op: ClassOp,
    /// Operands, in order. Intersection and subtraction are binary.
    pub operands: Vec<Node>,
}

/// A POSIX class such as `[:alpha:]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PosixClass {
    /// The span from `[:` to `:]`.
    pub span: Span,
    /// The class name, e.g. `alpha`.
    pub name: String,
    /// Whether written `[:^alpha:]`.
    pub negated: bool,
}

/// How a backreference, subroutine or condition names its group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum GroupRef {
    /// An absolute number, `\2`.
    Number(u32),
    /// A relative number, `\g{-1}`, with the absolute number it denotes.
    Relative {
        /// The offset as written.
        offset: i32,
        /// The resolved absolute number.
        number: u32,
    },
    /// A name, `\k<name>`.
    Name(String),
}

/// A backreference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backref {
    /// The span of the escape.
    pub span: Span,
    /// The referenced group.
    pub reference: GroupRef,
    /// Whether case-insensitive matching was in effect.
    pub casei: bool,
}

/// The condition of a conditional group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Condition {
    /// `(?(1)...)`, `(?(<name>)...)`: whether a group has matched.
    Group(GroupRef),
    /// `(?(R)...)`: whether inside any recursion.
    Recursion,
    /// `(?(R1)...)`: whether inside recursion into group 1.
    RecursionGroup(u32),
    /// `(?(R&name)...)`: whether inside recursion into a named group.
    RecursionName(String),
    /// `(?(?=...)...)`: a lookaround assertion.
    Assertion(Box<Node>),
}

/// A conditional group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conditional {
    /// The span from `(?(` to the final `)`.
    pub span: Span,
    /// What is tested.
    pub condition: Condition,
    /// Matched when the condition holds.
    pub yes: Box<Node>,
    /// Matched otherwise, if present.
    pub no: Option<Box<Node>>,
}

/// A `(?(DEFINE)...)` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Define {
    /// The span of the whole block.
    pub span: Span,
    /// The definitions; never matched directly.
    pub body: Box<Node>,
}

/// Target of a subroutine call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SubroutineTarget {
    /// Recursive call to whole pattern `(?R)` or `(?0)`.
    Recursive,
    /// Call to numbered group `(?1)`, `(?2)`, etc.
    Group(u32),
    /// Call to named group `(?&name)`.
    Named(String),
    /// Relative call `(?-1)`, `(?+1)`, with the absolute number it denotes.
    Relative {
        /// The offset as written.
        offset: i32,
        /// The resolved absolute number.
        number: u32,
    },
}

/// A recursion or subroutine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subroutine {
    /// The span of the call.
    pub span: Span,
    /// The called group.
    pub target: SubroutineTarget,
}

/// Types of assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnchorKind {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `\A`
    StartText,
    /// `\z`
    EndText,
    /// `\Z`
    EndTextOptionalNewline,
    /// `\G`
    ContinueFromPreviousMatchEnd,
    /// `\K`, resets the reported match start.
    KeepOut,
}

/// A zero-width assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// The span of the assertion.
    pub span: Span,
    /// Which assertion.
    pub kind: AnchorKind,
    /// Whether `^`/`$` match at line boundaries (the `m` flag).
    pub multiline: bool,
}

/// An unscoped inline flag setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineFlags {
    /// The span of `(?...)`.
    pub span: Span,
    /// The setting.
    pub modifiers: FlagModifiers,
}

/// A backtracking control verb or start-of-pattern setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verb {
    /// The span of `(*...)`.
    pub span: Span,
    /// The verb name, e.g. `COMMIT` or `UTF`. Empty for `(*:NAME)`.
    pub name: String,
    /// The argument after `:` or `=`, if any.
    pub arg: Option<String>,
}

impl Verb {
    /// Whether this is a start-of-pattern option setting such as `(*UTF)`.
    pub fn is_setting(&self) -> bool {
        crate::lexer::is_start_setting(&self.name)
    }
}

/// The argument of a callout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CalloutArg {
    /// `(?C)` or `(?C12)`.
    Number(u32),
    /// `(?C"text")` with any of PCRE's string delimiters.
    Text(String),
}

/// A callout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Callout {
    /// The span of `(?C...)`.
    pub span: Span,
    /// The argument.
    pub arg: CalloutArg,
}

/// A `(?#...)` comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// The span of `(?#...)`.
    pub span: Span,
    /// The text between `(?#` and `)`.
    pub text: String,
}
