//! PriceExtractor (C3).
//!
//! Grounded on
//! `original_source/app/Analayzer/detectors/price_extractor.py`: four
//! independent extractors, each trying an ordered list of regexes and
//! accepting the first that matches. The ordering here reproduces the
//! Python source's pattern list verbatim (spec.md §4.3: pattern order is
//! load-bearing, not incidental).

use once_cell::sync::Lazy;
use regex::Regex;

const NUM: &str = r"(\d+(?:\.\d+)?)";

fn parse_num(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// first_price: the first decimal anywhere in the uppercased text, after
/// replacing `US30` with `DJIUSD` so its digits aren't mistaken for a
/// price (spec.md §4.3).
pub fn extract_first_price(text: &str) -> Option<f64> {
    static FIRST_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(NUM).unwrap());
    let upper = text.to_uppercase().replace("US30", "DJIUSD");
    FIRST_PRICE
        .captures(&upper)
        .and_then(|c| parse_num(&c[1]))
}

static SECOND_PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i){NUM}\s*///\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)@\s*{NUM}\s*-\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)2(?:nd)?\s*limit\s*@\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i){NUM}\s*_{{2,}}\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)@\s*{NUM}\s*[-\s]\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i){NUM}\s*-\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"{NUM}\s*و\s*{NUM}\s*فروش")).unwrap(),
        Regex::new(&format!(r"{NUM}\s*و\s*{NUM}\s*خرید")).unwrap(),
        Regex::new(&format!(r"(?i){NUM}\s*/\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)=\s*{NUM}")).unwrap(),
    ]
});

static TWO_DECIMALS: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"{NUM}\D+{NUM}")).unwrap());

/// second_price: the ordered family from spec.md §4.3, stopping at the
/// first pattern that matches; patterns that carry two capture groups take
/// the right-hand (second) one, except the `=` pattern which has one.
pub fn extract_second_price(text: &str) -> Option<f64> {
    for pattern in SECOND_PRICE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let idx = if caps.len() > 2 { 2 } else { 1 };
            if let Some(v) = caps.get(idx).and_then(|m| parse_num(m.as_str())) {
                return Some(v);
            }
        }
    }
    // Fallback: two consecutive decimals anywhere, take the second.
    TWO_DECIMALS.captures(text).and_then(|c| parse_num(&c[2]))
}

static TP_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)tp\d*\s*[@:.\-]?\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)tp\s*(?:\d*\s*:\s*)?{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)\btp\b\s*[:\-@.]?\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)tp\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)tp1\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)tp1\s+{NUM}")).unwrap(),
        Regex::new(r"(?i)checkpoint\s*1\s*:\s*(\d+(?:\.\d+)?|OPEN)").unwrap(),
        Regex::new(&format!(r"(?i)takeprofit\s*1\s*=\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)take\s*profit\s*1\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"تی\s*پی\s*[:：]?\s*{NUM}")).unwrap(),
    ]
});

static TP_NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)tp\d+\s*[:\-]?\s*{NUM}")).unwrap());
static TP_NUMBERED_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)take\s*profit\s*\d+\s*[-:]\s*{NUM}")).unwrap());
static TP_PERSIAN_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"تی\s*پی\s*((?:\d+(?:\.\d+)?[\s,،و]*)+)").unwrap());
static TP_PERSIAN_LIST_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static TP_COMMA_LIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\btp\d*\b|take\s*profit)\s*:?\s*(\d+(?:\.\d+)?(?:\s*,\s*\d+(?:\.\d+)?)+)")
        .unwrap()
});

/// take_profits: per-line ordered pattern family plus whole-message
/// numbered scans and a Persian comma-list shortcut (spec.md §4.3). Values
/// equal to `1.0` are filtered as parsing noise (a TP index mistakenly
/// captured as a price).
pub fn extract_take_profits(text: &str) -> Vec<f64> {
    // A Persian comma/separator list after تی پی is a complete, standalone
    // answer — if present, every other pattern is bypassed.
    if let Some(caps) = TP_PERSIAN_LIST.captures(text) {
        let values: Vec<f64> = TP_PERSIAN_LIST_VALUE
            .find_iter(&caps[1])
            .filter_map(|m| parse_num(m.as_str()))
            .filter(|v| *v != 1.0)
            .collect();
        if !values.is_empty() {
            return values;
        }
    }

    let mut values = Vec::new();
    for line in text.split('\n') {
        if let Some(caps) = TP_COMMA_LIST_LINE.captures(line) {
            for m in TP_PERSIAN_LIST_VALUE.find_iter(&caps[1]) {
                if let Some(v) = parse_num(m.as_str()) {
                    values.push(v);
                }
            }
            continue;
        }
        for pattern in TP_LINE_PATTERNS.iter() {
            if pattern.is_match(line) {
                for caps in pattern.captures_iter(line) {
                    if let Some(v) = caps.get(1).and_then(|m| parse_num(m.as_str())) {
                        values.push(v);
                    }
                }
                break;
            }
        }
        for caps in TP_NUMBERED_LINE.captures_iter(line) {
            if let Some(v) = caps.get(1).and_then(|m| parse_num(m.as_str())) {
                values.push(v);
            }
        }
    }
    for caps in TP_NUMBERED_MESSAGE.captures_iter(text) {
        if let Some(v) = caps.get(1).and_then(|m| parse_num(m.as_str())) {
            values.push(v);
        }
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values.dedup();
    values.retain(|v| *v != 1.0);
    values
}

static SL_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)sl\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)sl\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)stop\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"حد\s*ضرر\s*[:：]?\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"حد\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"استاپ\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)stop\s*loss\s*:\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)sl\s*[-:]\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)sl\s*(\d+\.?\d*)")).unwrap(),
        Regex::new(&format!(r"(?i)stop\s*loss\s*[:\-@]\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)stoploss\s*=\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)sl\s*@\s*{NUM}")).unwrap(),
        Regex::new(&format!(r"(?i)stop\s*loss\s*(?:point)?\s*[:\-]?\s*{NUM}")).unwrap(),
    ]
});

static SL_FALLBACK_BEFORE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*\S*\s*\bsl\b").unwrap());
static SL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsl\b").unwrap());

/// stop_loss: line-by-line, first pattern to match wins. Falls back to
/// "the number immediately before the literal `sl` token" when a line
/// mentions `sl` but none of the ordered patterns matched it — a
/// supplemented heuristic carried from the Python source's last-resort
/// branch (see SPEC_FULL.md §4).
pub fn extract_stop_loss(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    for line in lower.split('\n') {
        for pattern in SL_LINE_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(line) {
                if let Some(v) = caps.get(1).and_then(|m| parse_num(m.as_str())) {
                    return Some(v);
                }
            }
        }
    }
    for line in lower.split('\n') {
        if SL_TOKEN.is_match(line) {
            if let Some(caps) = SL_FALLBACK_BEFORE_TOKEN.captures(line) {
                if let Some(v) = caps.get(1).and_then(|m| parse_num(m.as_str())) {
                    return Some(v);
                }
            }
        }
    }
    None
}

/// extract_price: a standalone simple-price utility (spec.md leaves this
/// as a small supporting extractor alongside the four named fields).
pub fn extract_simple_price(text: &str) -> Option<f64> {
    static SIMPLE: Lazy<Regex> = Lazy::new(|| Regex::new(NUM).unwrap());
    SIMPLE.captures(text).and_then(|c| parse_num(&c[1]))
}
