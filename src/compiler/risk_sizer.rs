//! RiskSizer (C7).
//!
//! Grounded on
//! `original_source/app/MetaTrader/trading/validation.py`'s
//! `calculate_lot_size_with_prices`: a risk-percent spec is turned into a
//! lot size from the stop distance and the symbol's tick value/size, then
//! walked down in 0.01 steps until the realized risk no longer exceeds the
//! requested amount.

const LOT_FLOOR: f64 = 0.01;
const LOT_STEP: f64 = 0.01;

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct RiskSizerInputs {
    pub open_price: f64,
    pub stop_loss_price: f64,
    pub tick_size: f64,
    pub tick_value: f64,
    /// The broker account balance, used when no explicit account size is
    /// configured (spec.md §4.7).
    pub account_balance: f64,
}

/// Outcome of a risk computation, including whether the floor had to be
/// breached (spec.md §4.7: "log that the user is taking more than the
/// nominal percent").
pub struct LotSizeResult {
    pub lot: f64,
    pub below_floor: bool,
}

/// `lot(symbol, riskSpec, openPrice, slPrice, accountSize) -> lot`
/// (spec.md §4.7). `risk_spec` is either a bare decimal lot size or a
/// `"N%"` risk specification.
pub fn lot_size(risk_spec: &str, account_size: Option<f64>, inputs: &RiskSizerInputs) -> LotSizeResult {
    let trimmed = risk_spec.trim();
    if !trimmed.ends_with('%') {
        return LotSizeResult {
            lot: trimmed.parse::<f64>().unwrap_or(LOT_FLOOR),
            below_floor: false,
        };
    }

    let pct: f64 = trimmed.trim_end_matches('%').trim().parse().unwrap_or(0.0);
    let account_size = match account_size {
        Some(v) if v > 0.0 => v,
        _ => inputs.account_balance,
    };

    let risk_amount = account_size * (pct / 100.0);
    let distance_ticks = (inputs.open_price - inputs.stop_loss_price).abs() / inputs.tick_size;

    let mut lot = round_to_cents(risk_amount / (distance_ticks * inputs.tick_value));
    let realized_risk = |lot: f64| lot * distance_ticks * inputs.tick_value;

    while realized_risk(lot) > risk_amount && lot > LOT_FLOOR {
        lot = round_to_cents(lot - LOT_STEP);
    }

    let below_floor = lot < LOT_FLOOR;
    LotSizeResult { lot, below_floor }
}
