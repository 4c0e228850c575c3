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

#![allow(dead_code)]

use pcre_audit::{ErrorKind, Node, ParseError, ReDoSAnalysis, Regex, Severity};

/// Parse a literal, panicking with the error on failure.
pub fn regex(pattern: &str) -> Regex {
    let result = pcre_audit::parse(pattern);
    assert!(
        result.is_ok(),
        "pattern {} should parse, got {:?}",
        pattern,
        result.err()
    );
    result.unwrap()
}

/// Parse a literal that must fail.
pub fn parse_error(pattern: &str) -> ParseError {
    let result = pcre_audit::parse(pattern);
    assert!(result.is_err(), "pattern {} should not parse", pattern);
    result.unwrap_err()
}

pub fn assert_error(pattern: &str, kind: ErrorKind) -> ParseError {
    let err = parse_error(pattern);
    assert_eq!(err.kind, kind, "wrong error for {}: {}", pattern, err);
    err
}

pub fn analyze(pattern: &str) -> ReDoSAnalysis {
    pcre_audit::analyze_redos(&regex(pattern))
}

pub fn severity(pattern: &str) -> Severity {
    analyze(pattern).severity
}

/// Every node of the tree in pre-order, paired with its parent.
pub fn walk<'a>(node: &'a Node, parent: Option<&'a Node>, out: &mut Vec<(&'a Node, Option<&'a Node>)>) {
    out.push((node, parent));
    for child in node.children() {
        walk(child, Some(node), out);
    }
}

/// A corpus covering every construct the parser knows.
pub const CORPUS: &[&str] = &[
    "/a+b/",
    "/^(a+)+$/",
    "/(?>a+)+$/",
    "/[^a-z_]+/i",
    r"/(\d{1,3}\.){3}\d{1,3}/",
    r"/(?<year>\d{4})-(?<month>\d\d)/",
    r"/(a)(b)\2\1\g{-1}\k<x>(?<x>c)/",
    "/(?|(a)|(b))(c)/",
    "/(?i)a(?-i:b)c/",
    r"/(?<=\d{3})x(?<!y)z(?=w)(?!v)/",
    r"/\p{Greek}+\P{L}\pN/u",
    "/[[:alpha:][:^digit:]]/",
    "/(a)?(?(1)b|c)/",
    "/(?(DEFINE)(?<d>\\d+))(?&d)/",
    "/\\((?:[^()]|(?R))*\\)/",
    "/(*UTF)(*LIMIT_MATCH=5)a(*SKIP)(*FAIL)|b(*MARK:m)/",
    "/(?C1)(?C\"x\")a(?#note)/",
    r"/\x41\x{263a}\101\o{17}\cA\e\Q.*\E/u",
    r"/\A\b\B\G\z\Z\K/",
    r"/a*?b+?c??d{2,}?e*+f++g?+h{1,2}+/",
    "#a/b#",
    "{a{2}}s",
    "/a # comment\n b/x",
    r"/\R\X\h\H\v\V\N\C/",
];
