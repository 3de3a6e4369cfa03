//! Core domain types shared across the parser, compiler, store, and
//! lifecycle engine.
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/domain/models/mod.rs`
//! and `trade_group_member.rs`: a small set of plain data structs plus
//! closed tagged unions for action/order type, re-exported from one module
//! rather than scattered across the crate.

use serde::{Deserialize, Serialize};

/// Trade direction. A closed tagged union, exhaustively matched everywhere
/// an order type or side is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn is_buy(self) -> bool {
        matches!(self, Action::Buy)
    }
}

/// Concrete order type selected by the compiler. Separate from `Action`
/// because a signal's direction can resolve to a market, stop, or limit
/// order depending on where price sits relative to the live quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Buy,
    Sell,
    BuyStop,
    BuyLimit,
    SellStop,
    SellLimit,
}

impl OrderType {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            OrderType::BuyStop | OrderType::BuyLimit | OrderType::SellStop | OrderType::SellLimit
        )
    }

    pub fn action(self) -> Action {
        match self {
            OrderType::Buy | OrderType::BuyStop | OrderType::BuyLimit => Action::Buy,
            OrderType::Sell | OrderType::SellStop | OrderType::SellLimit => Action::Sell,
        }
    }
}

/// The broker-side request action: open a deal, place a pending order,
/// modify SL/TP on an existing position, or remove a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeRequestAction {
    Deal,
    Pending,
    ModifySlTp,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillingMode {
    Ioc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Specified,
}

/// A signal freshly extracted from one chat message. Never persisted in
/// this shape — `Dispatcher` turns it into a `Signal` row plus `Position`
/// rows. See spec.md §3.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignal {
    pub action: Action,
    pub symbol: String,
    pub first_price: f64,
    pub second_price: Option<f64>,
    pub take_profits: Vec<f64>,
    pub stop_loss: f64,
}

/// Metadata identifying the chat message a `ParsedSignal` came from.
#[derive(Debug, Clone)]
pub struct SignalMeta {
    pub chat_id: i64,
    pub message_id: i64,
    pub channel_title: String,
}

impl SignalMeta {
    /// Normalize a chat id: strip a leading `-100` channel prefix, then
    /// take the absolute value (spec.md §3).
    pub fn normalize_chat_id(raw: i64) -> i64 {
        let s = raw.to_string();
        let stripped = s.strip_prefix("-100").unwrap_or(&s);
        stripped.parse::<i64>().unwrap_or(raw).abs()
    }
}

/// A persisted trade intent (spec.md §3 `Signal`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Signal {
    pub id: i64,
    pub source_channel_title: String,
    pub source_message_id: i64,
    pub source_chat_id: i64,
    pub open_price: f64,
    pub second_price: Option<f64>,
    pub stop_loss: f64,
    pub tp_list: String,
    pub symbol: String,
    pub created_at: String,
}

impl Signal {
    /// Parse the comma-joined `tp_list` column back into decimals.
    pub fn tp_values(&self) -> Vec<f64> {
        self.tp_list
            .split(',')
            .filter_map(|s| s.trim().parse::<f64>().ok())
            .collect()
    }

    pub fn join_tp_list(tps: &[f64]) -> String {
        tps.iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A persisted broker order opened under a `Signal` (spec.md §3 `Position`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Position {
    pub id: i64,
    pub signal_id: i64,
    pub broker_ticket: i64,
    pub user_id: i64,
    pub is_first: bool,
    pub is_second: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_channel_chat_id() {
        assert_eq!(SignalMeta::normalize_chat_id(-1001234567890), 1234567890);
        assert_eq!(SignalMeta::normalize_chat_id(-555), 555);
        assert_eq!(SignalMeta::normalize_chat_id(555), 555);
    }

    #[test]
    fn order_type_classifies_pending() {
        assert!(OrderType::BuyLimit.is_pending());
        assert!(!OrderType::Buy.is_pending());
    }

    #[test]
    fn signal_tp_list_round_trips() {
        let joined = Signal::join_tp_list(&[1900.0, 1950.5]);
        assert_eq!(joined, "1900,1950.5");
    }
}
