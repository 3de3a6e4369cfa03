//! ActionDetector (C4).
//!
//! Grounded on `original_source/app/Analayzer/detectors/action_detector.py`:
//! split the lowercased text on whitespace, classify the first token that
//! matches a buy/sell keyword or contains `buy`/`sell` as a substring.

use crate::domain::Action;

const BUY_KEYWORDS: &[&str] = &["buy", "بخر", "خرید", "بای"];
const SELL_KEYWORDS: &[&str] = &["sell", "selll", "بفروش", "فروش", "selling"];

/// Classifies intent as Buy, Sell, or `None` (spec.md §4.4). First match
/// wins in token order.
pub fn detect_action(lowercased_text: &str) -> Option<Action> {
    for token in lowercased_text.split_whitespace() {
        if BUY_KEYWORDS.contains(&token) || token.contains("buy") {
            return Some(Action::Buy);
        }
        if SELL_KEYWORDS.contains(&token) || token.contains("sell") {
            return Some(Action::Sell);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_buy_keyword() {
        assert_eq!(detect_action("buy eurusd @ 1.0850"), Some(Action::Buy));
    }

    #[test]
    fn detects_sell_substring() {
        assert_eq!(detect_action("selling xauusd now"), Some(Action::Sell));
    }

    #[test]
    fn detects_persian_buy() {
        assert_eq!(detect_action("خرید یورو @ 1.0850"), Some(Action::Buy));
    }

    #[test]
    fn first_token_wins() {
        assert_eq!(detect_action("buy then sell later"), Some(Action::Buy));
    }

    #[test]
    fn returns_none_without_keyword() {
        assert_eq!(detect_action("gm everyone"), None);
    }
}
