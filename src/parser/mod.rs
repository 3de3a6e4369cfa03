//! The signal parser family (C1-C5): tolerant, multi-lingual extraction of
//! a canonical `ParsedSignal` out of noisy chat text.

pub mod action;
pub mod normalize;
pub mod price;
pub mod symbol;

use std::collections::HashMap;

use crate::domain::ParsedSignal;

/// SignalParser (C5): orchestrates C1-C4 into one canonical record.
///
/// Grounded on `original_source/app/Analayzer/signal_parser.py`'s
/// `parse_message`: normalize, lowercase, detect action (bail on `None`),
/// extract the four price fields, resolve the symbol, then apply the
/// defensive post-condition that clears a `second_price` that coincides
/// with any other extracted price.
pub struct SignalParser<'a> {
    pub broker_symbols: &'a [String],
    pub symbol_mappings: &'a HashMap<String, String>,
    pub default_unresolved_symbol_to_gold: bool,
}

impl<'a> SignalParser<'a> {
    /// `parse(raw text) -> ParsedSignal or None` (spec.md §4.5). Returns
    /// `None` whenever action, first_price, stop_loss, or symbol cannot be
    /// determined — per spec.md §7 bucket 1, this is not an error.
    pub fn parse(&self, raw: &str) -> Option<ParsedSignal> {
        let normalized = normalize::normalize(raw);
        let lowered = normalized.to_lowercase();

        let action = action::detect_action(&lowered)?;
        let first_price = price::extract_first_price(&normalized)?;
        let stop_loss = price::extract_stop_loss(&normalized)?;

        let mut second_price = price::extract_second_price(&normalized);
        let take_profits = price::extract_take_profits(&normalized);

        let resolver = symbol::SymbolResolver::new(
            self.broker_symbols,
            self.symbol_mappings,
            self.default_unresolved_symbol_to_gold,
        );
        let candidates = symbol_candidates_from_text(&normalized);
        let symbol = resolver.resolve_any(candidates.iter().map(String::as_str))?;

        // Defensive post-condition (spec.md §4.5): these co-occurrences
        // are symptoms of a misparse, not a genuine second entry.
        if let Some(sp) = second_price {
            if sp == first_price || sp == stop_loss || take_profits.contains(&sp) {
                second_price = None;
            }
        }

        Some(ParsedSignal {
            action,
            symbol,
            first_price,
            second_price,
            take_profits,
            stop_loss,
        })
    }
}

/// Splits the whole message into whitespace-delimited words, stripping
/// only `/` and `-` from each (never digits), handed to the resolver one
/// at a time until one matches. Mirrors
/// `original_source/app/Analayzer/detectors/symbol_detector.py`'s
/// `detect_symbol`, which scans every word of the sentence rather than
/// pre-selecting a single candidate.
fn symbol_candidates_from_text(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .map(|tok| tok.replace(['/', '-'], ""))
        .filter(|tok| !tok.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    fn parser<'a>(broker_symbols: &'a [String], mappings: &'a HashMap<String, String>) -> SignalParser<'a> {
        SignalParser {
            broker_symbols,
            symbol_mappings: mappings,
            default_unresolved_symbol_to_gold: true,
        }
    }

    #[test]
    fn parses_s1_plain_english_signal() {
        let broker = vec!["EURUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        let parsed = p
            .parse("BUY EURUSD @ 1.0850\nSL: 1.0800\nTP: 1.0900, 1.0950")
            .unwrap();
        assert_eq!(parsed.action, Action::Buy);
        assert_eq!(parsed.symbol, "EURUSD");
        assert_eq!(parsed.first_price, 1.0850);
        assert_eq!(parsed.stop_loss, 1.0800);
        assert_eq!(parsed.second_price, None);
    }

    #[test]
    fn parses_s3_persian_signal() {
        let broker = vec!["EURUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        let parsed = p
            .parse("خرید یورو @ 1.0850\nحد ضرر: 1.0800\nتی پی: 1.0900")
            .unwrap();
        assert_eq!(parsed.action, Action::Buy);
        assert_eq!(parsed.symbol, "EURUSD");
        assert_eq!(parsed.first_price, 1.0850);
        assert_eq!(parsed.stop_loss, 1.0800);
    }

    #[test]
    fn returns_none_without_action_keyword() {
        let broker = vec!["EURUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        assert!(p.parse("just chatting here").is_none());
    }

    #[test]
    fn clears_second_price_when_it_duplicates_stop_loss() {
        let broker = vec!["EURUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        // second_price extraction would land on 1.0800, identical to SL.
        let parsed = p.parse("BUY EURUSD @ 1.0850 - 1.0800\nSL: 1.0800").unwrap();
        assert_eq!(parsed.second_price, None);
    }

    #[test]
    fn resolves_digit_bearing_alias_us30_to_dji() {
        let broker = vec!["DJIUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        let parsed = p.parse("BUY US30 @ 27000\nSL: 26900").unwrap();
        assert_eq!(parsed.symbol, "DJIUSD");
    }

    #[test]
    fn filler_word_does_not_win_ahead_of_true_symbol_token() {
        let broker = vec!["EURUSD".to_string()];
        let mappings = HashMap::new();
        let p = parser(&broker, &mappings);
        // "sell" itself would have passed the old length/stoplist filter
        // as a 3+ letter alphabetic run on the action line; the true
        // symbol token must still win.
        let parsed = p.parse("sell now EURUSD @ 1.0850\nSL: 1.0900").unwrap();
        assert_eq!(parsed.symbol, "EURUSD");
    }
}
