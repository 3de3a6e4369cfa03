//! LifecycleEngine (C12).
//!
//! Grounded on
//! `original_source/app/MetaTrader/monitoring/monitoring.py`'s
//! `MonitoringManager.trailing`/`manage_positions`: a 1 Hz tick loop per
//! broker account that advances stop-losses through TP levels and cancels
//! pending second entries once the sibling is active or profit-taking has
//! begun on the first. Reconnect/backoff shape grounded on the same
//! file's outer `while True` login-retry loop.

use std::time::Duration;

use tokio::time::interval;

use crate::domain::OrderType;
use crate::errors::{BridgeError, Result};
use crate::ports::{Broker, BrokerPosition, OrderRequest, TradeRequestAction};
use crate::store::SignalStore;

pub struct LifecycleConfig {
    pub save_profits: [u8; 4],
    pub close_positions_on_trail: bool,
    pub min_volume: f64,
}

pub struct LifecycleEngine<'a, B: Broker> {
    pub broker: &'a B,
    pub store: &'a SignalStore,
    pub config: &'a LifecycleConfig,
}

fn sorted_tps(action_is_buy: bool, mut tps: Vec<f64>) -> Vec<f64> {
    if action_is_buy {
        tps.sort_by(|a, b| a.partial_cmp(b).unwrap());
    } else {
        tps.sort_by(|a, b| b.partial_cmp(a).unwrap());
    }
    tps
}

impl<'a, B: Broker> LifecycleEngine<'a, B> {
    /// One logical loop per broker account: poll once per second, back
    /// off five seconds on a transient error without dropping state
    /// (spec.md §4.12/§7).
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                if err.is_transient() {
                    tracing::warn!(error = %err, "transient broker error, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                } else if err.is_fatal() {
                    tracing::error!(error = %err, "fatal broker error, abandoning this tick");
                } else {
                    tracing::debug!(error = %err, "tick skipped");
                }
            }
        }
    }

    /// One polling pass: advances trailing stops and arbitrates pending
    /// orders once. `run` calls this every second; exposed directly so
    /// tests can drive a single pass deterministically.
    pub async fn tick(&self) -> Result<()> {
        let positions = self.broker.positions_get().await?;
        let pendings = self.broker.orders_get().await?;

        for position in &positions {
            if let Err(err) = self.trail(position).await {
                if err.is_fatal() {
                    tracing::error!(error = %err, ticket = position.ticket, "fatal error trailing position");
                } else {
                    tracing::debug!(error = %err, ticket = position.ticket, "skipped trailing this position");
                }
            }
        }

        for pending in &pendings {
            if let Err(err) = self.arbitrate_pending(pending, &positions).await {
                tracing::debug!(error = %err, ticket = pending.ticket, "skipped pending arbitration");
            }
        }

        Ok(())
    }

    /// Advances SL through TP levels as the quote reaches them, closing
    /// the configured fraction of volume at each (spec.md §4.12
    /// "Trailing").
    async fn trail(&self, position: &BrokerPosition) -> Result<()> {
        let signal = self
            .store
            .find_signal_by_position(position.ticket)
            .await?
            .ok_or(BridgeError::OrphanPosition { ticket: position.ticket })?;

        let tp_levels = signal.tp_values();
        if tp_levels.len() < 2 {
            return Ok(());
        }

        let action = position.order_type.action();
        let stored_positions = self.store.positions_of_signal(signal.id).await?;
        let is_second_leg = stored_positions
            .iter()
            .any(|p| p.broker_ticket == position.ticket && p.is_second);
        let entry_reference = match signal.second_price {
            Some(second) if is_second_leg => second,
            _ => position.price_open,
        };

        let quote = self.broker.tick(&position.symbol).await?;
        let current = quote.for_action(action);
        let levels = sorted_tps(action.is_buy(), tp_levels);

        for (i, &tp) in levels.iter().enumerate() {
            let reached = if action.is_buy() { current >= tp } else { current <= tp };
            let sl_worse = if action.is_buy() {
                position.stop_loss < tp
            } else {
                position.stop_loss > tp
            };
            if reached && sl_worse {
                let new_sl = if i >= 1 { levels[i - 1] } else { entry_reference };
                self.move_stop_loss(position.ticket, new_sl).await?;

                let pct = self.config.save_profits.get(i).copied().unwrap_or(0);
                self.save_profit(position, pct).await?;
                break;
            }
        }

        Ok(())
    }

    async fn move_stop_loss(&self, ticket: i64, sl: f64) -> Result<()> {
        let request = OrderRequest {
            action: TradeRequestAction::ModifySlTp,
            symbol: String::new(),
            volume: 0.0,
            order_type: OrderType::Buy,
            price: 0.0,
            stop_loss: sl,
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

    /// Closes `pct`% of the position's current volume; closes the whole
    /// position outright at 100%, or when the partial-close remainder
    /// would fall below the broker minimum and trailing-close is enabled
    /// (spec.md §4.12).
    async fn save_profit(&self, position: &BrokerPosition, pct: u8) -> Result<()> {
        let close_volume = if pct >= 100 {
            position.volume
        } else {
            let partial = position.volume * (pct as f64 / 100.0);
            if partial < self.config.min_volume {
                if self.config.close_positions_on_trail {
                    position.volume
                } else {
                    return Ok(());
                }
            } else {
                partial
            }
        };

        let request = OrderRequest {
            action: TradeRequestAction::Remove,
            symbol: position.symbol.clone(),
            volume: close_volume,
            order_type: position.order_type,
            price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            filling: crate::domain::FillingMode::Ioc,
            time_in_force: crate::domain::TimeInForce::Gtc,
            expiration: None,
            magic: crate::compiler::order_compiler::MAGIC_NUMBER,
            ticket: Some(position.ticket),
        };
        self.broker.order_send(request).await?;
        Ok(())
    }

    /// Cancels an unreached pending when its sibling entry has already
    /// started profit-taking, or when there is no second entry to wait
    /// for at all (spec.md §4.12 "Pending-order arbitration").
    async fn arbitrate_pending(&self, pending: &BrokerPosition, live_positions: &[BrokerPosition]) -> Result<()> {
        let signal = self
            .store
            .find_signal_by_position(pending.ticket)
            .await?
            .ok_or(BridgeError::OrphanPosition { ticket: pending.ticket })?;

        let tp_levels = signal.tp_values();
        if tp_levels.is_empty() {
            return Ok(());
        }

        let action = pending.order_type.action();
        let levels = sorted_tps(action.is_buy(), tp_levels);
        let nearest = levels[0];

        let quote = self.broker.tick(&pending.symbol).await?;
        let current = quote.for_action(action);
        let reached_nearest = if action.is_buy() { current >= nearest } else { current <= nearest };
        if !reached_nearest {
            return Ok(());
        }

        let positions_of_signal = self.store.positions_of_signal(signal.id).await?;
        if positions_of_signal.len() <= 1 {
            return Ok(());
        }

        let should_cancel = if signal.second_price.is_none() || signal.second_price == Some(0.0) {
            true
        } else {
            live_positions.iter().any(|p| {
                positions_of_signal
                    .iter()
                    .any(|stored| stored.broker_ticket == p.ticket && stored.is_first)
            })
        };

        if should_cancel {
            let request = OrderRequest {
                action: TradeRequestAction::Remove,
                symbol: pending.symbol.clone(),
                volume: 0.0,
                order_type: pending.order_type,
                price: 0.0,
                stop_loss: 0.0,
                take_profit: 0.0,
                filling: crate::domain::FillingMode::Ioc,
                time_in_force: crate::domain::TimeInForce::Gtc,
                expiration: None,
                magic: crate::compiler::order_compiler::MAGIC_NUMBER,
                ticket: Some(pending.ticket),
            };
            self.broker.order_send(request).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_ascending_for_buy_and_descending_for_sell() {
        assert_eq!(sorted_tps(true, vec![1970.0, 1950.0, 1960.0]), vec![1950.0, 1960.0, 1970.0]);
        assert_eq!(sorted_tps(false, vec![1930.0, 1950.0, 1940.0]), vec![1950.0, 1940.0, 1930.0]);
    }
}
