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

//! Pattern modifiers and inline flag sets.
//!
//! Trailing modifiers (`/abc/imx`) and inline settings (`(?i)`, `(?-s:...)`)
//! share one bit representation so the parser can keep a simple stack of
//! `u32` values while descending into groups.

use serde::{Deserialize, Serialize};

/// Case insensitive matching, `i`.
pub const FLAG_CASEI: u32 = 1;
/// `^` and `$` match at line boundaries, `m`.
pub const FLAG_MULTI: u32 = 1 << 1;
/// `.` matches newlines, `s`.
pub const FLAG_DOTNL: u32 = 1 << 2;
/// Ignore unescaped whitespace and `#` comments outside classes, `x`.
pub const FLAG_IGNORE_SPACE: u32 = 1 << 3;
/// Additionally ignore space and tab inside classes, `xx`.
pub const FLAG_IGNORE_SPACE_CLASS: u32 = 1 << 4;
/// UTF-8 mode, `u`.
pub const FLAG_UNICODE: u32 = 1 << 5;
/// Quantifiers are lazy by default, `U`.
pub const FLAG_SWAP_GREED: u32 = 1 << 6;
/// Duplicate group names are allowed, `J`.
pub const FLAG_DUPNAMES: u32 = 1 << 7;
/// Plain parentheses do not capture, `n`.
pub const FLAG_NO_AUTO_CAPTURE: u32 = 1 << 8;
/// Match anchored at the start of the subject, `A` (modifier only).
pub const FLAG_ANCHORED: u32 = 1 << 9;
/// `$` matches only at the very end, `D` (modifier only).
pub const FLAG_DOLLAR_ENDONLY: u32 = 1 << 10;
/// Unknown escapes are errors, `X` (modifier only).
pub const FLAG_EXTRA: u32 = 1 << 11;
/// Extra analysis, `S` (modifier only, no effect in PCRE2).
pub const FLAG_STUDY: u32 = 1 << 12;
/// Case folding does not mix ASCII and non-ASCII, `r` (modifier only).
pub const FLAG_CASELESS_RESTRICT: u32 = 1 << 13;

/// The flags that `(?^)` clears.
pub const FLAGS_RESETTABLE: u32 =
    FLAG_CASEI | FLAG_MULTI | FLAG_DOTNL | FLAG_IGNORE_SPACE | FLAG_IGNORE_SPACE_CLASS | FLAG_NO_AUTO_CAPTURE;

const MODIFIERS: &[(char, u32)] = &[
    ('i', FLAG_CASEI),
    ('m', FLAG_MULTI),
    ('s', FLAG_DOTNL),
    ('x', FLAG_IGNORE_SPACE),
    ('u', FLAG_UNICODE),
    ('U', FLAG_SWAP_GREED),
    ('J', FLAG_DUPNAMES),
    ('n', FLAG_NO_AUTO_CAPTURE),
    ('A', FLAG_ANCHORED),
    ('D', FLAG_DOLLAR_ENDONLY),
    ('X', FLAG_EXTRA),
    ('S', FLAG_STUDY),
    ('r', FLAG_CASELESS_RESTRICT),
];

/// Parse the modifier letters that follow the closing delimiter.
///
/// Whitespace and newlines are accepted and ignored, as PHP does. On failure
/// the offending character and its byte index within `modifiers` are
/// returned.
pub fn parse_modifiers(modifiers: &str) -> Result<u32, (usize, char)> {
    let mut flags = 0;
    for (ix, c) in modifiers.char_indices() {
        if matches!(c, ' ' | '\n' | '\r') {
            continue;
        }
        match MODIFIERS.iter().find(|(letter, _)| *letter == c) {
            Some((_, bit)) => flags |= bit,
            None => return Err((ix, c)),
        }
    }
    Ok(flags)
}

/// Map a single inline flag letter to its bit.
///
/// Only the letters PCRE accepts inside `(?...)` are recognized; the
/// modifier-only flags (`A`, `D`, `X`, `S`, `u`, `r`) are rejected.
pub fn inline_flag(c: char) -> Option<u32> {
    match c {
        'i' => Some(FLAG_CASEI),
        'm' => Some(FLAG_MULTI),
        's' => Some(FLAG_DOTNL),
        'x' => Some(FLAG_IGNORE_SPACE),
        'U' => Some(FLAG_SWAP_GREED),
        'J' => Some(FLAG_DUPNAMES),
        'n' => Some(FLAG_NO_AUTO_CAPTURE),
        _ => None,
    }
}

/// Render a flag word as modifier letters, in canonical order.
pub fn modifier_letters(flags: u32) -> String {
    let mut out = String::new();
    for (letter, bit) in MODIFIERS {
        if flags & bit != 0 {
            out.push(*letter);
        }
    }
    out
}

/// An inline flag setting such as `(?i-s)` or `(?^x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagModifiers {
    /// Flags switched on.
    pub on: u32,
    /// Flags switched off.
    pub off: u32,
    /// Whether the setting started with `^`, clearing `imnsx` first.
    pub reset: bool,
}

impl FlagModifiers {
    /// Apply this setting on top of the currently active flags.
    pub fn apply(&self, current: u32) -> u32 {
        let base = if self.reset {
            current & !FLAGS_RESETTABLE
        } else {
            current
        };
        (base | self.on) & !self.off
    }

    /// Returns true if applying this setting to `current` changes nothing.
    pub fn is_noop(&self, current: u32) -> bool {
        self.apply(current) == current
    }

    /// The bits this setting names that are already in the requested state.
    pub fn redundant_bits(&self, current: u32) -> u32 {
        if self.reset {
            return 0;
        }
        (self.on & current) | (self.off & !current)
    }

    /// Render back to the letters used inside `(?...)`.
    pub fn to_letters(&self) -> String {
        let mut out = String::new();
        if self.reset {
            out.push('^');
        }
        push_inline_letters(&mut out, self.on);
        if self.off != 0 {
            out.push('-');
            push_inline_letters(&mut out, self.off);
        }
        out
    }
}

fn push_inline_letters(out: &mut String, bits: u32) {
    for (letter, bit) in [
        ('i', FLAG_CASEI),
        ('J', FLAG_DUPNAMES),
        ('m', FLAG_MULTI),
        ('n', FLAG_NO_AUTO_CAPTURE),
        ('s', FLAG_DOTNL),
        ('U', FLAG_SWAP_GREED),
    ] {
        if bits & bit != 0 {
            out.push(letter);
        }
    }
    if bits & FLAG_IGNORE_SPACE_CLASS != 0 {
        out.push_str("xx");
    } else if bits & FLAG_IGNORE_SPACE != 0 {
        out.push('x');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_roundtrip() {
        let flags = parse_modifiers("imsu").unwrap();
        assert_eq!(flags, FLAG_CASEI | FLAG_MULTI | FLAG_DOTNL | FLAG_UNICODE);
        assert_eq!(modifier_letters(flags), "imsu");
    }

    #[test]
    fn unknown_modifier_reports_position() {
        assert_eq!(parse_modifiers("ib"), Err((1, 'b')));
        assert_eq!(parse_modifiers("e"), Err((0, 'e')));
    }

    #[test]
    fn apply_and_noop() {
        let set = FlagModifiers {
            on: FLAG_CASEI,
            off: FLAG_DOTNL,
            reset: false,
        };
        assert_eq!(set.apply(FLAG_DOTNL | FLAG_MULTI), FLAG_CASEI | FLAG_MULTI);
        assert!(set.is_noop(FLAG_CASEI));
        assert_eq!(set.redundant_bits(FLAG_CASEI), FLAG_CASEI | FLAG_DOTNL);
    }

    #[test]
    fn caret_resets() {
        let set = FlagModifiers {
            on: FLAG_IGNORE_SPACE,
            off: 0,
            reset: true,
        };
        assert_eq!(set.apply(FLAG_CASEI | FLAG_UNICODE), FLAG_IGNORE_SPACE | FLAG_UNICODE);
        assert_eq!(set.to_letters(), "^x");
    }
}
