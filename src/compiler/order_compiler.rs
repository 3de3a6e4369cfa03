//! OrderCompiler (C8).
//!
//! Grounded on `original_source/app/MetaTrader/trading/trading.py`'s order
//! assembly (inside `TradingOperations.trade`) and
//! `validation.py::convert_closer_price`/`calculate_new_price`: selects a
//! market/stop/limit order type from the live quote, applies the
//! per-account "closer price" slippage offset, deduplicates against
//! existing broker state, and builds the broker request.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Action, FillingMode, OrderType, TimeInForce, TradeRequestAction};
use crate::ports::{BrokerPosition, OrderRequest, Quote};

pub const MAGIC_NUMBER: i64 = 2025;

/// Per-symbol tuning the compiler needs: whether a market-distance window
/// applies (spec.md §4.8: "for symbols where a market-distance threshold
/// is configured (gold)") and the closer-price offset.
pub struct CompilerConfig {
    pub market_distance_threshold: Option<f64>,
    pub closer_price_offset: f64,
    pub expire_pending_order_in_minutes: Option<i64>,
}

/// `determine_order_type(symbol, requested_type, requested_price)`
/// (spec.md §4.8).
pub fn determine_order_type(action: Action, requested_price: f64, quote: Quote, config: &CompilerConfig) -> OrderType {
    let q = quote.for_action(action);

    if let Some(threshold) = config.market_distance_threshold {
        if (requested_price - q).abs() <= threshold {
            return match action {
                Action::Buy => OrderType::Buy,
                Action::Sell => OrderType::Sell,
            };
        }
    }

    match action {
        Action::Buy if requested_price > q => OrderType::BuyStop,
        Action::Buy => OrderType::BuyLimit,
        Action::Sell if requested_price > q => OrderType::SellLimit,
        Action::Sell => OrderType::SellStop,
    }
}

/// Step 2: nudge entry price inward to reduce slippage sensitivity
/// (spec.md §4.8). Buy-limit and sell-stop add the offset; buy-stop and
/// sell-limit subtract it.
pub fn apply_closer_price_to_entry(order_type: OrderType, price: f64, offset: f64) -> f64 {
    match order_type {
        OrderType::BuyLimit | OrderType::SellStop => price + offset,
        OrderType::BuyStop | OrderType::SellLimit => price - offset,
        OrderType::Buy | OrderType::Sell => price,
    }
}

/// TP offset: subtract on Buy, add on Sell (spec.md §4.8).
pub fn apply_closer_price_to_tp(action: Action, tp: f64, offset: f64) -> f64 {
    match action {
        Action::Buy => tp - offset,
        Action::Sell => tp + offset,
    }
}

/// Step 3: exact-float dedup against live broker state.
pub fn is_duplicate(existing: &[BrokerPosition], symbol: &str, open_price: f64, sl: f64, tp: f64) -> bool {
    existing
        .iter()
        .any(|p| p.symbol == symbol && p.price_open == open_price && p.stop_loss == sl && p.take_profit == tp)
}

/// Assembles the broker request for a fresh entry (spec.md §4.8 step 4).
pub fn build_order_request(
    order_type: OrderType,
    symbol: &str,
    volume: f64,
    price: f64,
    stop_loss: f64,
    take_profit: f64,
    config: &CompilerConfig,
    server_time: DateTime<Utc>,
) -> OrderRequest {
    let action = if order_type.is_pending() {
        TradeRequestAction::Pending
    } else {
        TradeRequestAction::Deal
    };

    let (time_in_force, expiration) = match config.expire_pending_order_in_minutes {
        Some(minutes) if minutes > 0 && order_type.is_pending() => (
            TimeInForce::Specified,
            Some(server_time + Duration::minutes(minutes)),
        ),
        _ => (TimeInForce::Gtc, None),
    };

    OrderRequest {
        action,
        symbol: symbol.to_string(),
        volume,
        order_type,
        price,
        stop_loss,
        take_profit,
        filling: FillingMode::Ioc,
        time_in_force,
        expiration,
        magic: MAGIC_NUMBER,
        ticket: None,
    }
}

/// Coerces a pending order request into a plain market order, for the
/// retry-once-on-invalid-price path (spec.md §4.8 step 5).
pub fn coerce_to_market(mut request: OrderRequest) -> OrderRequest {
    request.order_type = request.order_type.action().into();
    request.action = TradeRequestAction::Deal;
    request.time_in_force = TimeInForce::Gtc;
    request.expiration = None;
    request
}

impl From<Action> for OrderType {
    fn from(action: Action) -> Self {
        match action {
            Action::Buy => OrderType::Buy,
            Action::Sell => OrderType::Sell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CompilerConfig {
        CompilerConfig {
            market_distance_threshold: Some(2.0),
            closer_price_offset: 0.5,
            expire_pending_order_in_minutes: Some(30),
        }
    }

    #[test]
    fn within_threshold_selects_market_order() {
        let quote = Quote { bid: 1950.0, ask: 1950.3 };
        let ot = determine_order_type(Action::Buy, 1951.0, quote, &config());
        assert_eq!(ot, OrderType::Buy);
    }

    #[test]
    fn buy_above_quote_is_buy_stop() {
        let quote = Quote { bid: 1950.0, ask: 1950.3 };
        let ot = determine_order_type(Action::Buy, 1960.0, quote, &config());
        assert_eq!(ot, OrderType::BuyStop);
    }

    #[test]
    fn buy_below_quote_is_buy_limit() {
        let quote = Quote { bid: 1950.0, ask: 1950.3 };
        let ot = determine_order_type(Action::Buy, 1940.0, quote, &config());
        assert_eq!(ot, OrderType::BuyLimit);
    }

    #[test]
    fn sell_above_quote_is_sell_limit() {
        let quote = Quote { bid: 1950.0, ask: 1950.3 };
        let ot = determine_order_type(Action::Sell, 1960.0, quote, &config());
        assert_eq!(ot, OrderType::SellLimit);
    }

    #[test]
    fn closer_price_adds_for_buy_limit() {
        assert_eq!(apply_closer_price_to_entry(OrderType::BuyLimit, 1940.0, 0.5), 1940.5);
    }

    #[test]
    fn closer_price_subtracts_for_buy_stop() {
        assert_eq!(apply_closer_price_to_entry(OrderType::BuyStop, 1960.0, 0.5), 1959.5);
    }

    #[test]
    fn dedup_detects_exact_match() {
        let existing = vec![BrokerPosition {
            ticket: 1,
            symbol: "XAUUSD".to_string(),
            order_type: OrderType::Buy,
            volume: 0.1,
            price_open: 1950.0,
            stop_loss: 1945.0,
            take_profit: 1960.0,
        }];
        assert!(is_duplicate(&existing, "XAUUSD", 1950.0, 1945.0, 1960.0));
        assert!(!is_duplicate(&existing, "XAUUSD", 1950.0, 1945.0, 1961.0));
    }
}
