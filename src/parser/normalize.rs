//! TextNormalizer (C1).
//!
//! Grounded on `original_source/app/Analayzer/parsers/text_processor.py`'s
//! `clean_text`/`normalize_for_parsing`: strip superscript/subscript code
//! points, NFKC-fold, collapse horizontal whitespace, drop decorative
//! marks, then keep only Latin letters, the Arabic/Persian block, digits,
//! whitespace, and a fixed punctuation set.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static HORIZONTAL_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\f\r]+").unwrap());

const DECORATIVE_MARKS: &[char] = &['\u{2611}', '\u{FE0F}', '\u{274C}'];

fn is_superscript_or_subscript(c: char) -> bool {
    matches!(c,
        '\u{2070}'..='\u{209F}' // superscripts and subscripts block
        | '\u{00B2}' | '\u{00B3}' | '\u{00B9}' // legacy superscript digits
    )
}

fn is_kept_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || ('\u{0600}'..='\u{06FF}').contains(&c)
        || c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ':' | ';' | '!' | '?' | '(' | ')' | '{' | '}' | '[' | ']' | '/' | '+'
                | '-' | '=' | '@' | '#' | '%' | '&' | '*' | '\'' | '"' | '<' | '>'
        )
}

/// Pure function: fold Unicode, strip decoration, preserve newlines and
/// the target alphabets (spec.md §4.1). Idempotent by construction: every
/// step either removes characters or maps onto a fixed-point form, so a
/// second pass is a no-op.
pub fn normalize(raw: &str) -> String {
    let without_scripts: String = raw.chars().filter(|c| !is_superscript_or_subscript(*c)).collect();
    let nfkc: String = without_scripts.nfkc().collect();

    let mut out = String::with_capacity(nfkc.len());
    for line in nfkc.split('\n') {
        if !out.is_empty() {
            out.push('\n');
        }
        let collapsed = HORIZONTAL_WHITESPACE_RUN.replace_all(line, " ");
        let without_marks: String = collapsed.chars().filter(|c| !DECORATIVE_MARKS.contains(c)).collect();
        let filtered: String = without_marks.chars().filter(|c| is_kept_char(*c)).collect();
        out.push_str(filtered.trim());
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_preserves_newlines() {
        let input = "BUY   EURUSD  @ 1.0850\nSL:    1.0800";
        let result = normalize(input);
        assert_eq!(result, "BUY EURUSD @ 1.0850\nSL: 1.0800");
    }

    #[test]
    fn preserves_persian_letters() {
        let input = "خرید یورو @ 1.0850";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn drops_decorative_marks_and_disallowed_symbols() {
        let input = "TP1 ✅☑️ hit ❌ 1950$";
        let result = normalize(input);
        assert!(!result.contains('✅'));
        assert!(!result.contains('❌'));
        assert!(!result.contains('$'));
    }

    #[test]
    fn is_idempotent() {
        let input = "BUY  gold¹ @ 1950\u{FEFF}\nSL 1945";
        let once = normalize(input);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
}
