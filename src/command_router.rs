//! CommandRouter (C11).
//!
//! Grounded on spec.md §4.11's keyword-to-intent table (the kept revision
//! of `original_source/app/MessageHandler.py` predates this command set,
//! so the routing table itself is authored directly from the
//! specification) and on `trading.py`'s `risk_free_positions` /
//! `close_half_signal` / `delete_signal` / `update_signal` for the
//! position-mutation operations each intent performs.

use crate::domain::{ParsedSignal, TradeRequestAction};
use crate::errors::{BridgeError, Result};
use crate::ports::{Broker, OrderRequest};
use crate::store::SignalStore;

const EDIT_KEYWORDS: &[&str] = &["edit", "edite", "update", "modify"];
const DELETE_KEYWORDS: &[&str] = &["حذف", "delete", "close", "not a signal", "vip"];
const RISK_FREE_KEYWORDS: &[&str] = &["فری", "risk free", "risk-free"];
const HALF_KEYWORD: &str = "half";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandIntent {
    InlineStopLossUpdate,
    ReplyStopLossUpdate,
    ReplyFullReparse,
    ReplyDelete { half: bool },
    ReplyRiskFree,
}

fn contains_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lowered.contains(k))
}

/// Classifies a lowercased operator message into one of the five intents
/// from spec.md §4.11, given whether it is a reply and whether it carries
/// a re-parseable price. `None` means the message is not a command.
pub fn classify(lowered_text: &str, is_reply: bool, reparsed: Option<&ParsedSignal>) -> Option<CommandIntent> {
    if contains_any(lowered_text, DELETE_KEYWORDS) && is_reply {
        return Some(CommandIntent::ReplyDelete {
            half: lowered_text.contains(HALF_KEYWORD),
        });
    }
    if contains_any(lowered_text, RISK_FREE_KEYWORDS) && is_reply {
        return Some(CommandIntent::ReplyRiskFree);
    }
    if is_reply && reparsed.is_some() {
        return Some(CommandIntent::ReplyFullReparse);
    }
    if contains_any(lowered_text, EDIT_KEYWORDS) {
        return Some(if is_reply {
            CommandIntent::ReplyStopLossUpdate
        } else {
            CommandIntent::InlineStopLossUpdate
        });
    }
    None
}

/// Digit-length-based guard from spec.md §4.11/§9: an edit is rejected
/// (not truncated) when the candidate SL's integer digit count doesn't
/// match the stored one.
fn digit_length(value: f64) -> usize {
    (value.trunc().abs() as i64).to_string().len()
}

pub struct CommandRouter<'a, B: Broker> {
    pub store: &'a SignalStore,
    pub broker: &'a B,
}

impl<'a, B: Broker> CommandRouter<'a, B> {
    async fn modify_all_positions_sl(&self, signal_id: i64, sl: f64) -> Result<()> {
        let positions = self.store.positions_of_signal(signal_id).await?;
        for position in positions {
            let request = OrderRequest {
                action: TradeRequestAction::ModifySlTp,
                symbol: String::new(),
                volume: 0.0,
                order_type: crate::domain::OrderType::Buy,
                price: 0.0,
                stop_loss: sl,
                take_profit: 0.0,
                filling: crate::domain::FillingMode::Ioc,
                time_in_force: crate::domain::TimeInForce::Gtc,
                expiration: None,
                magic: crate::compiler::order_compiler::MAGIC_NUMBER,
                ticket: Some(position.broker_ticket),
            };
            self.broker.order_send(request).await?;
        }
        self.store.update_stop_loss(signal_id, sl).await?;
        Ok(())
    }

    /// Inline/reply stop-loss update: validates the candidate SL's digit
    /// length against the stored one before applying it.
    pub async fn update_stop_loss(&self, chat_id: i64, message_id: Option<i64>, candidate_sl: f64) -> Result<()> {
        let signal = match message_id {
            Some(mid) => self.store.find_signal_by_chat(chat_id, mid).await?,
            None => self.store.find_latest_signal_by_chat(chat_id).await?,
        }
        .ok_or(BridgeError::SignalNotFound)?;

        if digit_length(candidate_sl) != digit_length(signal.stop_loss) {
            return Err(BridgeError::StopLossLengthMismatch {
                stored: signal.stop_loss.to_string(),
                candidate: candidate_sl.to_string(),
            });
        }

        self.modify_all_positions_sl(signal.id, candidate_sl).await
    }

    /// Reply edit with full re-parse: updates SL and tp_list together.
    pub async fn apply_reparse(&self, chat_id: i64, message_id: i64, reparsed: &ParsedSignal) -> Result<()> {
        let signal = self
            .store
            .find_signal_by_chat(chat_id, message_id)
            .await?
            .ok_or(BridgeError::SignalNotFound)?;

        self.modify_all_positions_sl(signal.id, reparsed.stop_loss).await?;
        self.store.update_tp_list(signal.id, &reparsed.take_profits).await
    }

    async fn close_position(&self, ticket: i64, volume: Option<f64>) -> Result<()> {
        let request = OrderRequest {
            action: TradeRequestAction::Remove,
            symbol: String::new(),
            volume: volume.unwrap_or(0.0),
            order_type: crate::domain::OrderType::Buy,
            price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            filling: crate::domain::FillingMode::Ioc,
            time_in_force: crate::domain::TimeInForce::Gtc,
            expiration: None,
            magic: crate::compiler::order_compiler::MAGIC_NUMBER,
            ticket: Some(ticket),
        };
        self.broker.order_send(request).await?;
        Ok(())
    }

    /// Reply delete: closes every position under the Signal; rows cascade
    /// on removal. With the `half` keyword, closes half of each instead
    /// and moves its SL to its own entry price (spec.md §4.11).
    pub async fn delete(&self, chat_id: i64, message_id: i64, half: bool) -> Result<()> {
        let signal = self
            .store
            .find_signal_by_chat(chat_id, message_id)
            .await?
            .ok_or(BridgeError::SignalNotFound)?;

        let positions = self.store.positions_of_signal(signal.id).await?;
        for position in &positions {
            if half {
                let live = self.find_live_position(position.broker_ticket).await?;
                if let Some(live) = live {
                    self.close_position(position.broker_ticket, Some(live.volume / 2.0)).await?;
                    let request = OrderRequest {
                        action: TradeRequestAction::ModifySlTp,
                        symbol: String::new(),
                        volume: 0.0,
                        order_type: crate::domain::OrderType::Buy,
                        price: 0.0,
                        stop_loss: live.price_open,
                        take_profit: 0.0,
                        filling: crate::domain::FillingMode::Ioc,
                        time_in_force: crate::domain::TimeInForce::Gtc,
                        expiration: None,
                        magic: crate::compiler::order_compiler::MAGIC_NUMBER,
                        ticket: Some(position.broker_ticket),
                    };
                    self.broker.order_send(request).await?;
                }
            } else {
                self.close_position(position.broker_ticket, None).await?;
            }
        }

        if !half {
            self.store.delete_signal(signal.id).await?;
        }
        Ok(())
    }

    async fn find_live_position(&self, ticket: i64) -> Result<Option<crate::ports::BrokerPosition>> {
        let positions = self.broker.positions_get().await?;
        Ok(positions.into_iter().find(|p| p.ticket == ticket))
    }

    /// Reply risk-free: set SL to the first-entry's fill price, then
    /// close half of every position (spec.md §4.11; pairing carried from
    /// `trading.py::risk_free_positions`, see SPEC_FULL.md §4).
    pub async fn risk_free(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let signal = self
            .store
            .find_signal_by_chat(chat_id, message_id)
            .await?
            .ok_or(BridgeError::SignalNotFound)?;

        let positions = self.store.positions_of_signal(signal.id).await?;
        let first = positions.iter().find(|p| p.is_first);
        let entry_price = match first {
            Some(first) => match self.find_live_position(first.broker_ticket).await? {
                Some(live) => live.price_open,
                None => signal.open_price,
            },
            None => signal.open_price,
        };

        self.modify_all_positions_sl(signal.id, entry_price).await?;

        for position in &positions {
            if let Some(live) = self.find_live_position(position.broker_ticket).await? {
                self.close_position(position.broker_ticket, Some(live.volume / 2.0)).await?;
            }
        }
        Ok(())
    }
}
