//! Dispatcher (C10).
//!
//! Grounded on `original_source/app/MetaTrader/trading/trading.py`'s
//! `TradingOperations.trade`: gate the parsed signal, validate and
//! reorient its prices, compute the aggregate TP, reuse or create the
//! persisted Signal, then open the first (and conditionally second) entry
//! order through the compiler. Mirrors
//! `poruru210-sankey-copier/relay-server/src/message_handler/trade_signal.rs`'s
//! logging style — every rejection and gate is traced before it's discarded.

use chrono::Utc;

use crate::compiler::order_compiler::{
    apply_closer_price_to_entry, apply_closer_price_to_tp, build_order_request, coerce_to_market,
    determine_order_type, is_duplicate, CompilerConfig,
};
use crate::compiler::price_validator::PriceValidator;
use crate::compiler::risk_sizer::{lot_size, RiskSizerInputs};
use crate::domain::{Action, ParsedSignal, SignalMeta};
use crate::errors::{BridgeError, Result};
use crate::ports::{Broker, OrderSendOutcome};
use crate::store::{NewSignal, SignalStore};

#[derive(Clone, Copy)]
pub struct DispatchGates<'a> {
    pub channel_whitelist: &'a [i64],
    pub channel_blacklist: &'a [i64],
    pub symbol_whitelist: &'a [String],
    pub symbol_blacklist: &'a [String],
    pub timer_start: &'a str,
    pub timer_end: &'a str,
}

fn list_allows<T: PartialEq>(value: &T, whitelist: &[T], blacklist: &[T]) -> bool {
    if !whitelist.is_empty() {
        return whitelist.contains(value);
    }
    !blacklist.contains(value)
}

/// Parses `HH:MM` into minutes-since-midnight; malformed input never
/// gates (fails open so a misconfigured timer doesn't silently discard
/// every signal).
fn minutes_of_day(hhmm: &str) -> Option<u32> {
    let mut parts = hhmm.splitn(2, ':');
    let h: u32 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next()?.parse().ok()?;
    Some(h * 60 + m)
}

fn within_time_window(now_minutes: u32, start: &str, end: &str) -> bool {
    match (minutes_of_day(start), minutes_of_day(end)) {
        (Some(s), Some(e)) if s <= e => now_minutes >= s && now_minutes <= e,
        (Some(s), Some(e)) => now_minutes >= s || now_minutes <= e,
        _ => true,
    }
}

pub struct Dispatcher<'a, B: Broker> {
    pub store: &'a SignalStore,
    pub broker: &'a B,
    pub price_validator: &'a PriceValidator,
    pub compiler_config: &'a CompilerConfig,
    pub user_id: i64,
    pub high_risk: bool,
    /// `"N%"` or a bare decimal lot size, fed straight into `lot_size`
    /// (spec.md §4.7).
    pub lot_spec: &'a str,
    /// Configured account size; `None` falls back to the broker's live
    /// balance.
    pub account_size: Option<f64>,
}

impl<'a, B: Broker> Dispatcher<'a, B> {
    /// `dispatch(meta, parsed)` (spec.md §4.10). Returns `Ok(None)` for a
    /// silent gate rejection, `Ok(Some(signal_id))` on success.
    pub async fn dispatch(&self, meta: &SignalMeta, mut parsed: ParsedSignal, gates: DispatchGates<'_>) -> Result<Option<i64>> {
        let chat_id = SignalMeta::normalize_chat_id(meta.chat_id);

        if !list_allows(&chat_id, gates.channel_whitelist, gates.channel_blacklist) {
            tracing::debug!(chat_id, "channel not permitted, dropping signal");
            return Ok(None);
        }
        if !list_allows(&parsed.symbol, gates.symbol_whitelist, gates.symbol_blacklist) {
            tracing::debug!(symbol = %parsed.symbol, "symbol not permitted, dropping signal");
            return Ok(None);
        }

        let now_minutes = {
            let now = Utc::now();
            (now.format("%H").to_string().parse::<u32>().unwrap_or(0)) * 60
                + now.format("%M").to_string().parse::<u32>().unwrap_or(0)
        };
        if !within_time_window(now_minutes, gates.timer_start, gates.timer_end) {
            tracing::debug!("outside configured time window, dropping signal");
            return Ok(None);
        }

        let quote = self.broker.tick(&parsed.symbol).await?;
        let live_price = quote.for_action(parsed.action);

        parsed.first_price = self
            .price_validator
            .validate(parsed.action, parsed.first_price, &parsed.symbol, live_price, false, false);
        parsed.stop_loss = self
            .price_validator
            .validate(parsed.action, parsed.stop_loss, &parsed.symbol, live_price, true, false);
        if let Some(second) = parsed.second_price {
            parsed.second_price = Some(self.price_validator.validate(
                parsed.action,
                second,
                &parsed.symbol,
                live_price,
                false,
                true,
            ));
        }
        parsed.take_profits = self.price_validator.validate_tp_list(
            parsed.action,
            &parsed.take_profits,
            &parsed.symbol,
            parsed.first_price,
            parsed.second_price,
        );

        // Reorient so first_price is always the nearer-to-market entry.
        if let Some(second) = parsed.second_price {
            let inverted = match parsed.action {
                Action::Buy => parsed.first_price > second,
                Action::Sell => parsed.first_price < second,
            };
            if inverted {
                let first = parsed.first_price;
                parsed.first_price = second;
                parsed.second_price = Some(first);
            }
        }

        let aggregate_tp = if parsed.take_profits.is_empty() {
            0.0
        } else {
            match parsed.action {
                Action::Buy => parsed.take_profits.iter().cloned().fold(f64::MIN, f64::max),
                Action::Sell => parsed.take_profits.iter().cloned().fold(f64::MAX, f64::min),
            }
        };

        let signal_id = if let Some(signal) = self
            .store
            .find_exact_signal(parsed.first_price, parsed.second_price, parsed.stop_loss, &parsed.symbol)
            .await?
        {
            signal.id
        } else {
            let ticket = self
                .open_entry(&parsed, aggregate_tp, parsed.first_price, false)
                .await?;
            let new_signal = NewSignal {
                source_channel_title: meta.channel_title.clone(),
                source_message_id: meta.message_id,
                source_chat_id: chat_id,
                open_price: parsed.first_price,
                second_price: parsed.second_price,
                stop_loss: parsed.stop_loss,
                tp_list: crate::domain::Signal::join_tp_list(&parsed.take_profits),
                symbol: parsed.symbol.clone(),
                created_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            };
            let (signal_id, _position_id) = self
                .store
                .insert_signal_with_first_position(new_signal, ticket, self.user_id)
                .await?;
            signal_id
        };

        if self.high_risk {
            if let Some(second_price) = parsed.second_price {
                let ticket = self.open_entry(&parsed, aggregate_tp, second_price, true).await?;
                self.store
                    .insert_position(signal_id, ticket, self.user_id, false, true)
                    .await?;
            }
        }

        Ok(Some(signal_id))
    }

    async fn open_entry(&self, parsed: &ParsedSignal, aggregate_tp: f64, entry_price: f64, _is_second: bool) -> Result<i64> {
        let quote = self.broker.tick(&parsed.symbol).await?;
        let order_type = determine_order_type(parsed.action, entry_price, quote, self.compiler_config);
        let adjusted_entry = apply_closer_price_to_entry(order_type, entry_price, self.compiler_config.closer_price_offset);
        let adjusted_tp = apply_closer_price_to_tp(parsed.action, aggregate_tp, self.compiler_config.closer_price_offset);

        let existing_positions = self.broker.positions_get().await?;
        let existing_orders = self.broker.orders_get().await?;
        if is_duplicate(&existing_positions, &parsed.symbol, adjusted_entry, parsed.stop_loss, adjusted_tp)
            || is_duplicate(&existing_orders, &parsed.symbol, adjusted_entry, parsed.stop_loss, adjusted_tp)
        {
            return Err(BridgeError::DuplicatePosition);
        }

        let symbol_info = self.broker.symbol_info(&parsed.symbol).await?;
        // Only a "N%" risk spec with no configured account_size needs the
        // live balance (spec.md §4.7); skip the extra broker call otherwise.
        let needs_balance = self.lot_spec.trim().ends_with('%')
            && !matches!(self.account_size, Some(v) if v > 0.0);
        let account_balance = if needs_balance { self.broker.account_balance().await? } else { 0.0 };
        let sizing = lot_size(
            self.lot_spec,
            self.account_size,
            &RiskSizerInputs {
                open_price: adjusted_entry,
                stop_loss_price: parsed.stop_loss,
                tick_size: symbol_info.tick_size,
                tick_value: symbol_info.tick_value,
                account_balance,
            },
        );
        if sizing.below_floor {
            tracing::warn!(symbol = %parsed.symbol, lot = sizing.lot, "risk sizing fell below the lot floor");
        }

        let server_time = self.broker.server_time().await?;
        let request = build_order_request(
            order_type,
            &parsed.symbol,
            sizing.lot,
            adjusted_entry,
            parsed.stop_loss,
            adjusted_tp,
            self.compiler_config,
            server_time,
        );

        let result = self.broker.order_send(request.clone()).await?;
        match result.outcome {
            OrderSendOutcome::Done => result.ticket.ok_or(BridgeError::Other("broker accepted order without a ticket".into())),
            OrderSendOutcome::InvalidPrice => {
                tracing::warn!(symbol = %parsed.symbol, "invalid price, retrying as market order");
                let retry = self.broker.order_send(coerce_to_market(request)).await?;
                match retry.outcome {
                    OrderSendOutcome::Done => retry.ticket.ok_or(BridgeError::Other("broker accepted retry without a ticket".into())),
                    _ => Err(BridgeError::InvalidPrice(parsed.symbol.clone())),
                }
            }
            OrderSendOutcome::AlgoTradingDisabled => Err(BridgeError::AlgoTradingDisabled),
            OrderSendOutcome::Requote => Err(BridgeError::InvalidPrice(parsed.symbol.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_wins_over_blacklist_when_non_empty() {
        let whitelist = vec![1_i64, 2];
        let blacklist = vec![1_i64];
        assert!(list_allows(&1, &whitelist, &blacklist));
        assert!(!list_allows(&3, &whitelist, &blacklist));
    }

    #[test]
    fn blacklist_applies_when_whitelist_empty() {
        let whitelist: Vec<i64> = Vec::new();
        let blacklist = vec![9_i64];
        assert!(!list_allows(&9, &whitelist, &blacklist));
        assert!(list_allows(&1, &whitelist, &blacklist));
    }

    #[test]
    fn time_window_handles_overnight_span() {
        assert!(within_time_window(23 * 60, "22:00", "02:00"));
        assert!(within_time_window(60, "22:00", "02:00"));
        assert!(!within_time_window(12 * 60, "22:00", "02:00"));
    }

    #[test]
    fn time_window_handles_same_day_span() {
        assert!(within_time_window(10 * 60, "09:00", "17:00"));
        assert!(!within_time_window(20 * 60, "09:00", "17:00"));
    }
}
