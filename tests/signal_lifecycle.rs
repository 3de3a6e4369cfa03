//! End-to-end coverage across the store, compiler, and lifecycle engine,
//! following `poruru210-sankey-copier/relay-server/tests/db_trade_groups.rs`'s
//! style: a real in-memory store plus a fake broker, driven through the
//! public API rather than internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use signal_bridge::command_router::CommandRouter;
use signal_bridge::compiler::order_compiler::CompilerConfig;
use signal_bridge::compiler::price_validator::PriceValidator;
use signal_bridge::dispatch::{DispatchGates, Dispatcher};
use signal_bridge::domain::{Action, OrderType, ParsedSignal, SignalMeta};
use signal_bridge::errors::Result;
use signal_bridge::lifecycle::{LifecycleConfig, LifecycleEngine};
use signal_bridge::ports::{
    Broker, BrokerPosition, OrderRequest, OrderSendOutcome, OrderSendResult, Quote, SymbolInfo,
};
use signal_bridge::store::{NewSignal, SignalStore};

struct FakeBroker {
    positions: Mutex<Vec<BrokerPosition>>,
    orders: Mutex<Vec<BrokerPosition>>,
    quote: Mutex<Quote>,
    sent: Mutex<Vec<OrderRequest>>,
}

impl FakeBroker {
    fn new(positions: Vec<BrokerPosition>, quote: Quote) -> Self {
        Self {
            positions: Mutex::new(positions),
            orders: Mutex::new(Vec::new()),
            quote: Mutex::new(quote),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn login(&self) -> Result<()> {
        Ok(())
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        Ok(vec!["XAUUSD".to_string()])
    }

    async fn symbol_info(&self, _symbol: &str) -> Result<SymbolInfo> {
        Ok(SymbolInfo {
            tick_size: 0.01,
            tick_value: 1.0,
            digits: 4,
        })
    }

    async fn tick(&self, _symbol: &str) -> Result<Quote> {
        Ok(*self.quote.lock().await)
    }

    async fn positions_get(&self) -> Result<Vec<BrokerPosition>> {
        Ok(self.positions.lock().await.clone())
    }

    async fn orders_get(&self) -> Result<Vec<BrokerPosition>> {
        Ok(self.orders.lock().await.clone())
    }

    async fn order_send(&self, request: OrderRequest) -> Result<OrderSendResult> {
        // Apply a partial close/SL-move directly to the matching position
        // so subsequent ticks observe the effect, mirroring a real broker.
        if let Some(ticket) = request.ticket {
            let mut positions = self.positions.lock().await;
            if let Some(pos) = positions.iter_mut().find(|p| p.ticket == ticket) {
                if request.stop_loss != 0.0 {
                    pos.stop_loss = request.stop_loss;
                }
                if request.volume > 0.0 && request.volume < pos.volume {
                    pos.volume -= request.volume;
                } else if request.volume == 0.0 {
                    // modify-only request; volume unchanged.
                } else {
                    positions.retain(|p| p.ticket != ticket);
                }
            }
        }
        self.sent.lock().await.push(request);
        Ok(OrderSendResult {
            outcome: OrderSendOutcome::Done,
            ticket: Some(9999),
        })
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }

    async fn account_balance(&self) -> Result<f64> {
        Ok(10_000.0)
    }
}

fn buy_position(ticket: i64, volume: f64, price_open: f64, stop_loss: f64) -> BrokerPosition {
    BrokerPosition {
        ticket,
        symbol: "XAUUSD".to_string(),
        order_type: OrderType::Buy,
        volume,
        price_open,
        stop_loss,
        take_profit: 0.0,
    }
}

fn sample_signal(tp_list: &str) -> NewSignal {
    NewSignal {
        source_channel_title: "Gold VIP".to_string(),
        source_message_id: 1,
        source_chat_id: 55,
        open_price: 1950.0,
        second_price: None,
        stop_loss: 1945.0,
        tp_list: tp_list.to_string(),
        symbol: "XAUUSD".to_string(),
        created_at: "2026-01-01 00:00:00".to_string(),
    }
}

/// S6: trailing through the first TP level closes the configured fraction
/// of volume and moves the stop to the entry price, leaving the position
/// open.
#[tokio::test]
async fn trailing_saves_partial_profit_at_first_tp_without_closing() {
    let store = SignalStore::connect("sqlite::memory:", false).await.unwrap();
    let (_signal_id, _position_id) = store
        .insert_signal_with_first_position(sample_signal("1960,1970,1980,1990"), 501, 1)
        .await
        .unwrap();

    let broker = FakeBroker::new(
        vec![buy_position(501, 0.1, 1950.0, 1945.0)],
        Quote { bid: 1960.5, ask: 1961.0 },
    );
    let config = LifecycleConfig {
        save_profits: [25, 25, 25, 25],
        close_positions_on_trail: true,
        min_volume: 0.01,
    };
    let engine = LifecycleEngine {
        broker: &broker,
        store: &store,
        config: &config,
    };

    engine.tick().await.unwrap();

    let positions = broker.positions_get().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert!((positions[0].volume - 0.075).abs() < 1e-9);
    assert_eq!(positions[0].stop_loss, 1950.0);
}

/// S7: a reply "delete" closes every position under the Signal and the
/// Signal row (and its Positions) are gone afterward.
#[tokio::test]
async fn delete_command_closes_positions_and_cascades_signal() {
    let store = SignalStore::connect("sqlite::memory:", false).await.unwrap();
    let (signal_id, _) = store
        .insert_signal_with_first_position(sample_signal("1960"), 601, 1)
        .await
        .unwrap();
    store.insert_position(signal_id, 602, 1, false, true).await.unwrap();

    let broker = FakeBroker::new(
        vec![buy_position(601, 0.1, 1950.0, 1945.0), buy_position(602, 0.1, 1950.0, 1945.0)],
        Quote { bid: 1950.0, ask: 1950.5 },
    );
    let router = CommandRouter {
        store: &store,
        broker: &broker,
    };

    router.delete(55, 1, false).await.unwrap();

    let remaining_positions = broker.positions_get().await.unwrap();
    assert!(remaining_positions.is_empty());
    let signal = store.find_signal_by_chat(55, 1).await.unwrap();
    assert!(signal.is_none());
}

/// S8: dispatching the identical signal twice (same price/SL/symbol)
/// reuses the existing Signal row instead of creating a second one.
#[tokio::test]
async fn duplicate_signal_reuses_existing_row() {
    let store = SignalStore::connect("sqlite::memory:", false).await.unwrap();
    store
        .insert_signal_with_first_position(sample_signal("1960"), 701, 1)
        .await
        .unwrap();

    let reused = store
        .find_exact_signal(1950.0, None, 1945.0, "XAUUSD")
        .await
        .unwrap();
    assert!(reused.is_some());

    let different = store
        .find_exact_signal(1950.0, None, 1944.0, "XAUUSD")
        .await
        .unwrap();
    assert!(different.is_none());
}

/// A "N%" lot spec sizes the entry order off the live symbol tick data and
/// account balance, instead of a fixed volume (spec.md §4.7).
#[tokio::test]
async fn dispatch_sizes_entry_volume_from_percent_risk_spec() {
    let store = SignalStore::connect("sqlite::memory:", false).await.unwrap();
    let broker = FakeBroker::new(Vec::new(), Quote { bid: 1950.0, ask: 1950.3 });

    let price_validator = PriceValidator::new(vec!["XAUUSD".to_string()]);
    let compiler_config = CompilerConfig {
        market_distance_threshold: Some(2.0),
        closer_price_offset: 0.0,
        expire_pending_order_in_minutes: None,
    };
    let dispatcher = Dispatcher {
        store: &store,
        broker: &broker,
        price_validator: &price_validator,
        compiler_config: &compiler_config,
        user_id: 1,
        high_risk: false,
        lot_spec: "1%",
        account_size: None,
    };
    let gates = DispatchGates {
        channel_whitelist: &[],
        channel_blacklist: &[],
        symbol_whitelist: &[],
        symbol_blacklist: &[],
        timer_start: "00:00",
        timer_end: "23:59",
    };
    let parsed = ParsedSignal {
        action: Action::Buy,
        symbol: "XAUUSD".to_string(),
        first_price: 1950.0,
        second_price: None,
        take_profits: vec![1960.0],
        stop_loss: 1945.0,
    };
    let meta = SignalMeta {
        chat_id: 77,
        message_id: 1,
        channel_title: "Gold VIP".to_string(),
    };

    dispatcher.dispatch(&meta, parsed, gates).await.unwrap();

    let sent = broker.sent.lock().await;
    assert_eq!(sent.len(), 1);
    // balance 10_000 * 1% = 100 risk; 5.0 price distance / 0.01 tick_size =
    // 500 ticks; 100 / (500 * 1.0 tick_value) = 0.20 lots.
    assert!((sent[0].volume - 0.20).abs() < 1e-9, "got {}", sent[0].volume);
}

/// Signals survive a process restart: reconnecting to the same on-disk
/// file sees the rows a prior connection wrote (spec.md §3 persistence).
#[tokio::test]
async fn signal_persists_across_reconnect_to_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bridge.sqlite");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    {
        let store = SignalStore::connect(&url, false).await.unwrap();
        store
            .insert_signal_with_first_position(sample_signal("1960"), 801, 1)
            .await
            .unwrap();
    }

    let reopened = SignalStore::connect(&url, false).await.unwrap();
    let found = reopened
        .find_exact_signal(1950.0, None, 1945.0, "XAUUSD")
        .await
        .unwrap();
    assert!(found.is_some());
}
