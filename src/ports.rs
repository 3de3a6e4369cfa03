//! Consumed/produced boundaries, modeled as `async_trait` ports.
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/ports/outbound.rs`:
//! the relay-server never talks to a concrete database or ZMQ socket
//! directly, it depends on a trait. Here the chat platform, the broker
//! terminal, and the notification sink are all "thin plumbing over
//! well-documented third-party surfaces" (spec.md §1) and so are
//! represented the same way — the binary wires in real adapters, tests
//! wire in fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Action, FillingMode, OrderType, TimeInForce, TradeRequestAction};
use crate::errors::Result;

/// One inbound chat event. `Deleted` carries no text.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    New(ChatMessage),
    Edited(ChatMessage),
    Deleted { chat_id: i64, message_id: i64 },
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub channel_title: String,
    pub text: String,
    /// Present when this message is a reply; names the parent message id.
    pub reply_to_message_id: Option<i64>,
}

/// The chat-platform boundary (consumed). One implementation per real
/// platform; tests supply an in-memory stream.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn next_event(&self) -> Result<Option<ChatEvent>>;
}

/// A live bid/ask quote for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Ask for Buy-side requests, bid for Sell-side — spec.md §4.8/§4.12.
    pub fn for_action(self, action: Action) -> f64 {
        match action {
            Action::Buy => self.ask,
            Action::Sell => self.bid,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolInfo {
    pub tick_size: f64,
    pub tick_value: f64,
    /// Digits in the quote's integer part; drives short-form reconstruction.
    pub digits: u32,
}

/// A live broker position or pending order.
#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub ticket: i64,
    pub symbol: String,
    pub order_type: OrderType,
    pub volume: f64,
    pub price_open: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Parameters for one `orderSend` call.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub action: TradeRequestAction,
    pub symbol: String,
    pub volume: f64,
    pub order_type: OrderType,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub filling: FillingMode,
    pub time_in_force: TimeInForce,
    pub expiration: Option<DateTime<Utc>>,
    pub magic: i64,
    /// Set when this request targets an existing ticket (modify/remove).
    pub ticket: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSendOutcome {
    Done,
    InvalidPrice,
    AlgoTradingDisabled,
    Requote,
}

#[derive(Debug, Clone)]
pub struct OrderSendResult {
    pub outcome: OrderSendOutcome,
    pub ticket: Option<i64>,
}

/// The broker boundary (consumed) — spec.md §6.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn login(&self) -> Result<()>;
    async fn list_symbols(&self) -> Result<Vec<String>>;
    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;
    async fn tick(&self, symbol: &str) -> Result<Quote>;
    async fn positions_get(&self) -> Result<Vec<BrokerPosition>>;
    async fn orders_get(&self) -> Result<Vec<BrokerPosition>>;
    async fn order_send(&self, request: OrderRequest) -> Result<OrderSendResult>;
    async fn server_time(&self) -> Result<DateTime<Utc>>;
    /// Current account balance, used by `RiskSizer` when no `account_size`
    /// is configured (spec.md §4.7).
    async fn account_balance(&self) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Warn,
    Error,
    Critical,
}

/// The notification sink boundary (produced) — spec.md §6.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, level: NotifyLevel, message: &str);
}
