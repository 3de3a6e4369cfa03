//! PriceValidator (C6).
//!
//! Grounded on `original_source/app/MetaTrader/trading/validation.py`'s
//! `PriceValidator.validate`/`validate_tp_list`: broker quotes for
//! multi-digit-integer symbols (gold, indices) are five- or six-digit
//! integer-plus-fraction; users write abbreviated forms. Reconstruction
//! prefixes the candidate's digits with the quote's high-order digits,
//! then walks the prefix up or down one integer at a time until the
//! required directional inequality holds.

use crate::domain::Action;

fn integer_digit_count(value: f64) -> u32 {
    let int_part = value.trunc().abs() as i64;
    if int_part == 0 {
        1
    } else {
        int_part.to_string().len() as u32
    }
}

/// Rebuilds a short-form price by prefixing it with the quote's
/// high-order digits, keeping the candidate's fractional part.
fn reconstruct(candidate: f64, quote: f64) -> f64 {
    let candidate_digits = integer_digit_count(candidate);
    let quote_digits = integer_digit_count(quote);
    if candidate_digits >= quote_digits {
        return candidate;
    }
    let fraction = candidate.fract().abs();
    let candidate_int = candidate.trunc().abs() as i64;
    let quote_int = quote.trunc().abs() as i64;
    let base = (quote_int / 10i64.pow(candidate_digits)) * 10i64.pow(candidate_digits) + candidate_int;
    base as f64 + fraction
}

/// Step the high-order prefix by one integer unit in the given direction,
/// preserving the candidate's fractional part.
fn step(value: f64, digits: u32, up: bool) -> f64 {
    let unit = 10f64.powi(digits as i32);
    if up {
        value + unit
    } else {
        value - unit
    }
}

pub struct PriceValidator {
    /// Symbols for which short-form reconstruction applies — those whose
    /// current quote has a multi-digit integer part (gold, indices). FX
    /// majors never reconstruct (spec.md §4.6).
    reconstructable_symbols: Vec<String>,
}

impl PriceValidator {
    pub fn new(reconstructable_symbols: Vec<String>) -> Self {
        Self {
            reconstructable_symbols,
        }
    }

    fn applies_to(&self, symbol: &str) -> bool {
        self.reconstructable_symbols.iter().any(|s| s == symbol)
    }

    /// `validate(action, price, symbol, quote, isSl, isSecondPrice) -> price`
    /// (spec.md §4.6).
    pub fn validate(
        &self,
        action: Action,
        price: f64,
        symbol: &str,
        quote: f64,
        is_sl: bool,
        is_second_price: bool,
    ) -> f64 {
        if !self.applies_to(symbol) || integer_digit_count(price) >= integer_digit_count(quote) {
            return price;
        }

        let digits = integer_digit_count(price);
        let mut reconstructed = reconstruct(price, quote);

        if is_sl {
            loop {
                let bad = match action {
                    Action::Buy => reconstructed >= quote,
                    Action::Sell => reconstructed <= quote,
                };
                if !bad {
                    break;
                }
                reconstructed = step(reconstructed, digits, !action.is_buy());
            }
        } else if is_second_price {
            loop {
                let bad = match action {
                    Action::Buy => reconstructed >= quote,
                    Action::Sell => reconstructed <= quote,
                };
                if !bad {
                    break;
                }
                reconstructed = step(reconstructed, digits, !action.is_buy());
            }
        }

        reconstructed
    }

    /// `validate_tp_list(action, tps, symbol, firstPrice, secondPrice)`
    /// (spec.md §4.6): each short TP is walked up (Buy) or down (Sell)
    /// until it clears both anchor prices. The previous TP's high-order
    /// digits seed the next reconstruction when shorter than it.
    pub fn validate_tp_list(
        &self,
        action: Action,
        tps: &[f64],
        symbol: &str,
        first_price: f64,
        second_price: Option<f64>,
    ) -> Vec<f64> {
        if !self.applies_to(symbol) {
            return tps.to_vec();
        }

        let anchor_low = match action {
            Action::Buy => first_price.max(second_price.unwrap_or(first_price)),
            Action::Sell => first_price.min(second_price.unwrap_or(first_price)),
        };

        let mut last_price = first_price;
        let mut out = Vec::with_capacity(tps.len());
        for &tp in tps {
            let fp_digits = integer_digit_count(first_price);
            let tp_digits = integer_digit_count(tp);
            if tp_digits >= fp_digits {
                out.push(tp);
                last_price = tp;
                continue;
            }

            let hint = if integer_digit_count(last_price) > tp_digits {
                last_price
            } else {
                first_price
            };
            let digits = tp_digits;
            let mut reconstructed = reconstruct(tp, hint);
            loop {
                let ok = match action {
                    Action::Buy => reconstructed > first_price && reconstructed > anchor_low,
                    Action::Sell => reconstructed < first_price && reconstructed < anchor_low,
                };
                if ok {
                    break;
                }
                reconstructed = step(reconstructed, digits, action.is_buy());
            }
            out.push(reconstructed);
            last_price = reconstructed;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xauusd_validator() -> PriceValidator {
        PriceValidator::new(vec!["XAUUSD".to_string()])
    }

    #[test]
    fn reconstructs_short_form_price_against_quote() {
        let v = xauusd_validator();
        let out = v.validate(Action::Buy, 50.0, "XAUUSD", 2350.0, false, false);
        assert_eq!(integer_digit_count(out), integer_digit_count(2350.0));
    }

    #[test]
    fn sl_reconstruction_stays_below_quote_for_buy() {
        let v = xauusd_validator();
        let out = v.validate(Action::Buy, 50.0, "XAUUSD", 2350.0, true, false);
        assert!(out < 2350.0);
    }

    #[test]
    fn sl_reconstruction_stays_above_quote_for_sell() {
        let v = xauusd_validator();
        let out = v.validate(Action::Sell, 50.0, "XAUUSD", 2350.0, true, false);
        assert!(out > 2350.0);
    }

    #[test]
    fn fx_majors_never_reconstruct() {
        let v = PriceValidator::new(vec!["XAUUSD".to_string()]);
        let out = v.validate(Action::Buy, 1.085, "EURUSD", 1.0855, false, false);
        assert_eq!(out, 1.085);
    }

    #[test]
    fn tp_list_lands_on_profitable_side_for_buy() {
        let v = xauusd_validator();
        let out = v.validate_tp_list(Action::Buy, &[60.0, 70.0], "XAUUSD", 2350.0, None);
        for tp in out {
            assert!(tp > 2350.0);
        }
    }
}
