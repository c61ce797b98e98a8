//! Numeric substitution markers (`{0}`, `{1}`, …) in translated values.
//!
//! A translated value is structurally valid against an arity `n` when every
//! marker it contains is a well-formed `{digits}` with index `< n` and every
//! brace is accounted for (`{{`/`}}` escape a literal brace). Values that
//! fail validation go through a deterministic repair pass before being
//! discarded: translators working in right-to-left scripts routinely leave
//! directional control marks around braces, and some input methods produce
//! localized digit glyphs inside markers.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Outcome of checking a value against an expected marker arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerCheck {
    Valid,
    /// Invalid as-is, but the repair pass produced a valid value.
    Repaired(String),
    Invalid,
}

/// Number of distinct `{N}` markers in a default-language source string.
/// Escaped braces (`{{`/`}}`) are literal text and never open a marker.
pub fn marker_arity(source: &str) -> usize {
    let mut distinct: BTreeSet<String> = BTreeSet::new();
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
            }
            '{' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !digits.is_empty() && chars.peek() == Some(&'}') {
                    chars.next();
                    distinct.insert(digits);
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
            }
            _ => {}
        }
    }
    distinct.len()
}

/// Simulate positional formatting with `arity` arguments: every `{` must
/// open a `{digits}` marker with index `< arity`, and a `}` is only legal
/// closing a marker or doubled as an escape.
pub fn validate(value: &str, arity: usize) -> bool {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    continue;
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some('}') => break,
                        _ => return false,
                    }
                }
                let Ok(index) = digits.parse::<usize>() else {
                    return false;
                };
                if index >= arity {
                    return false;
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                } else {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

// Bidi control characters that end up glued to braces in RTL translations:
// LRM/RLM/ALM, embeddings/overrides + PDF, isolates + PDI.
const BIDI_MARKS: &str = "\u{200E}\u{200F}\u{061C}\u{202A}\u{202B}\u{202C}\u{202D}\u{202E}\u{2066}\u{2067}\u{2068}\u{2069}";

fn re_bidi_around_braces() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let cls = format!("[{BIDI_MARKS}]+");
        Regex::new(&format!(r"(?:{cls})?([{{}}])(?:{cls})?")).unwrap()
    })
}

fn re_localized_digit_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // \d is Unicode-aware in the regex crate, so this also matches
    // Arabic-Indic and Eastern Arabic-Indic digit glyphs.
    RE.get_or_init(|| Regex::new(r"\{(\d+)\}").unwrap())
}

fn digit_value(c: char) -> Option<u32> {
    c.to_digit(10).or(match c as u32 {
        // Arabic-Indic and Eastern Arabic-Indic digits.
        v @ 0x0660..=0x0669 => Some(v - 0x0660),
        v @ 0x06F0..=0x06F9 => Some(v - 0x06F0),
        _ => None,
    })
}

/// Deterministic, idempotent fixups for the two failure patterns we
/// tolerate: bidi control marks touching braces, and localized digit glyphs
/// inside markers. Anything else stays as-is.
pub fn repair(value: &str) -> String {
    let stripped = re_bidi_around_braces().replace_all(value, "$1");
    re_localized_digit_marker()
        .replace_all(&stripped, |caps: &regex::Captures<'_>| {
            let ascii: Option<String> = caps[1]
                .chars()
                .map(|c| digit_value(c).and_then(|d| char::from_digit(d, 10)))
                .collect();
            match ascii {
                Some(ascii) => format!("{{{ascii}}}"),
                // A digit glyph we cannot map; leave the marker untouched.
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Validate, repairing once on failure.
pub fn check(value: &str, arity: usize) -> MarkerCheck {
    if validate(value, arity) {
        return MarkerCheck::Valid;
    }
    let repaired = repair(value);
    if repaired != value && validate(&repaired, arity) {
        MarkerCheck::Repaired(repaired)
    } else {
        MarkerCheck::Invalid
    }
}
