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

use pcre_audit::{Dialect, ErrorKind, Parser};

mod common;

#[test]
fn test_unclosed_class() {
    let err = common::assert_error("/[a-z/", ErrorKind::UnclosedClass);
    assert_eq!(err.offset, 0);
    assert!(err.snippet.contains('^'));
}

#[test]
fn test_unresolved_backref() {
    let err = common::assert_error(r"/(a)\2/", ErrorKind::UnresolvedBackref);
    assert_eq!(err.offset, 3);
    common::assert_error(r"/\k<missing>/", ErrorKind::UnresolvedBackref);
    common::assert_error(r"/(a)\g{-2}/", ErrorKind::UnresolvedBackref);
}

#[test]
fn test_backref_into_branch_reset() {
    let err = common::assert_error(r"/(?|(a)|(b))\2/", ErrorKind::UnresolvedBackref);
    assert_eq!(err.offset, 11);
    assert!(pcre_audit::parse(r"/(?|(a)|(b)(c))\2/").is_ok());
}

#[test]
fn test_backref_to_group_zero() {
    let err = common::assert_error(r"/a\0b/", ErrorKind::UnresolvedBackref);
    assert_eq!(err.offset, 1);
    assert!(err.hint.is_some());
    common::assert_error(r"/a\g{0}/", ErrorKind::UnresolvedBackref);
    assert!(pcre_audit::parse(r"/[\0]/").is_ok());
    assert!(pcre_audit::parse(r"/a\x{0}b/").is_ok());
}

#[test]
fn test_unbounded_lookbehind() {
    let err = common::assert_error("/(?<=a+)b/", ErrorKind::UnboundedLookbehind);
    assert_eq!(err.offset, 0);
    common::assert_error("/(?<!x*)y/", ErrorKind::UnboundedLookbehind);
}

#[test]
fn test_variable_lookbehind_depends_on_dialect() {
    assert!(pcre_audit::parse("/(?<=ab|c)d/").is_ok());
    assert!(pcre_audit::parse("/(?<=a{1,3})d/").is_ok());

    let mut old = Parser::new();
    old.dialect(Dialect::Pcre2_10_34);
    assert!(old.parse("/(?<=ab|c)d/").is_ok());
    let err = old.parse("/(?<=a{1,3})d/").unwrap_err();
    assert_eq!(err.kind, ErrorKind::VariableLookbehind);
}

#[test]
fn test_long_fixed_lookbehind() {
    assert!(pcre_audit::parse("/(?<=a{300})b/").is_ok());
    let mut old = Parser::new();
    old.dialect(Dialect::Pcre2_10_34);
    assert!(old.parse("/(?<=a{300})b/").is_ok());
    common::assert_error("/(?<=a{1,300})b/", ErrorKind::LookbehindTooLong);
}

#[test]
fn test_delimiter_errors() {
    common::assert_error("", ErrorKind::EmptyPattern);
    common::assert_error("   ", ErrorKind::EmptyPattern);
    common::assert_error("abc", ErrorKind::InvalidDelimiter);
    common::assert_error(r"\a\", ErrorKind::InvalidDelimiter);
    let err = common::assert_error("/abc", ErrorKind::MissingDelimiter);
    assert!(err.hint.is_some());
    common::assert_error("/a/q", ErrorKind::UnknownModifier);
}

#[test]
fn test_structure_errors() {
    common::assert_error("/(a/", ErrorKind::UnmatchedParen);
    common::assert_error("/a)/", ErrorKind::UnmatchedParen);
    common::assert_error("/*a/", ErrorKind::NothingToRepeat);
    common::assert_error("/a|+/", ErrorKind::NothingToRepeat);
    common::assert_error("/a{3,2}/", ErrorKind::InvalidRange);
    common::assert_error("/[z-a]/", ErrorKind::InvalidRange);
    common::assert_error("/(?<n>a)(?<n>b)/", ErrorKind::DuplicateName);
    common::assert_error("/(?1)/", ErrorKind::UnresolvedSubroutine);
    common::assert_error("/(?(1)a|b|c)/", ErrorKind::InvalidConditional);
}

#[test]
fn test_nesting_limit() {
    let deep = format!("/{}a{}/", "(".repeat(40), ")".repeat(40));
    let mut parser = Parser::new();
    parser.nest_limit(32);
    assert_eq!(parser.parse(&deep).unwrap_err().kind, ErrorKind::NestingTooDeep);
    assert!(pcre_audit::parse(&deep).is_ok());
}

#[test]
fn test_error_display_and_serialize() {
    let err = common::parse_error("/[a-z/");
    assert!(err.to_string().contains("offset 0"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "UnclosedClass");
    assert_eq!(json["offset"], 0);
}
