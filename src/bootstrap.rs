//! Process wiring: config, logging, store, and the long-lived tasks.
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/bootstrap.rs` and
//! `bootstrap/services.rs`: one function that loads configuration,
//! initializes logging, opens the store, and spawns the long-lived loops,
//! returning only on shutdown or unrecoverable setup failure. Concrete
//! chat-platform and broker clients are deliberately not constructed here
//! — spec.md §1 places them out of scope ("thin plumbing over
//! well-documented third-party surfaces"); `run_with` is the generic entry
//! point a deployment wires those into.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::command_router::CommandRouter;
use crate::compiler::order_compiler::CompilerConfig;
use crate::compiler::price_validator::PriceValidator;
use crate::concurrency::SignalLocks;
use crate::config::Config;
use crate::dispatch::{DispatchGates, Dispatcher};
use crate::lifecycle::{LifecycleConfig, LifecycleEngine};
use crate::ports::{Broker, ChatClient, ChatEvent, NotificationSink, NotifyLevel};
use crate::store::SignalStore;

/// Worker pool sizes from spec.md §5.
const COMMAND_WORKER_POOL_SIZE: usize = 4;
const ORDER_WORKER_POOL_SIZE: usize = 2;

/// Loads configuration and logging, connects the store, and idles — the
/// minimal bring-up that does not depend on a concrete chat/broker
/// adapter. Real deployments call [`run_with`] instead once those
/// adapters exist.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let mut notifications = crate::logging::init(256);
    tracing::info!("signal-bridge starting up");

    let store = SignalStore::connect(&config.database_file, !config.disable_cache).await?;
    if let Some(stats) = store.cache_stats().await {
        tracing::info!(hit_rate = stats.hit_rate(), "signal store cache online");
    }

    // Drain the notification channel to the log until a real sink adapter
    // is wired in; this keeps the channel from filling silently.
    tokio::spawn(async move {
        while let Some(line) = notifications.recv().await {
            tracing::info!(notification = %line, "dropped notification (no sink configured)");
        }
    });

    tracing::info!("bring-up complete; no chat/broker adapters configured");
    Ok(())
}

/// The full orchestration: one ingress task per channel feed is the
/// caller's responsibility (one `ChatClient` per feed); this spawns the
/// per-account tick loop and the bounded command/order worker pools and
/// then drives the chat event stream to completion (spec.md §5).
pub async fn run_with<C, B, N>(config: Config, chat: Arc<C>, broker: Arc<B>, notifier: Arc<N>) -> anyhow::Result<()>
where
    C: ChatClient + 'static,
    B: Broker + 'static,
    N: NotificationSink + 'static,
{
    let store = Arc::new(SignalStore::connect(&config.database_file, !config.disable_cache).await?);
    broker.login().await?;
    notifier.notify(NotifyLevel::Warn, "signal-bridge online").await;

    let command_permits = Arc::new(Semaphore::new(COMMAND_WORKER_POOL_SIZE));
    let order_permits = Arc::new(Semaphore::new(ORDER_WORKER_POOL_SIZE));
    // Commands against the same chat (and so, usually, the same signal)
    // serialize; unrelated chats do not block each other (spec.md §5).
    let signal_locks = Arc::new(SignalLocks::new());

    let lifecycle_config = LifecycleConfig {
        save_profits: [
            config.meta_trader.save_profits.first().copied().unwrap_or(25),
            config.meta_trader.save_profits.get(1).copied().unwrap_or(25),
            config.meta_trader.save_profits.get(2).copied().unwrap_or(25),
            config.meta_trader.save_profits.get(3).copied().unwrap_or(25),
        ],
        close_positions_on_trail: config.meta_trader.close_positions_on_trail,
        min_volume: 0.01,
    };

    let lifecycle_store = store.clone();
    let lifecycle_broker = broker.clone();
    let lifecycle_task = tokio::spawn(async move {
        let engine = LifecycleEngine {
            broker: lifecycle_broker.as_ref(),
            store: lifecycle_store.as_ref(),
            config: &lifecycle_config,
        };
        engine.run().await;
    });

    let compiler_config = CompilerConfig {
        market_distance_threshold: Some(2.0),
        closer_price_offset: config.meta_trader.closer_price,
        expire_pending_order_in_minutes: config.meta_trader.expire_pendin_order_in_minutes,
    };
    let reconstructable_symbols = vec!["XAUUSD".to_string(), "DJIUSD".to_string()];
    let price_validator = PriceValidator::new(reconstructable_symbols);

    let gates = DispatchGates {
        channel_whitelist: &config.telegram.channels.white_list,
        channel_blacklist: &config.telegram.channels.black_list,
        symbol_whitelist: &config.meta_trader.symbols.white_list,
        symbol_blacklist: &config.meta_trader.symbols.black_list,
        timer_start: &config.timer.start,
        timer_end: &config.timer.end,
    };

    let dispatcher = Dispatcher {
        store: store.as_ref(),
        broker: broker.as_ref(),
        price_validator: &price_validator,
        compiler_config: &compiler_config,
        user_id: 0,
        high_risk: config.meta_trader.high_risk,
        lot_spec: &config.meta_trader.lot,
        account_size: config.meta_trader.account_size,
    };

    let router = CommandRouter {
        store: store.as_ref(),
        broker: broker.as_ref(),
    };

    let broker_symbols = broker.list_symbols().await?;
    let parser = crate::parser::SignalParser {
        broker_symbols: &broker_symbols,
        symbol_mappings: &config.meta_trader.symbol_mappings,
        default_unresolved_symbol_to_gold: config.meta_trader.default_unresolved_symbol_to_gold,
    };

    while let Some(event) = chat.next_event().await? {
        match event {
            ChatEvent::New(message) => {
                let _permit = order_permits.acquire().await?;
                if let Some(parsed) = parser.parse(&message.text) {
                    let meta = crate::domain::SignalMeta {
                        chat_id: message.chat_id,
                        message_id: message.message_id,
                        channel_title: message.channel_title,
                    };
                    if let Err(err) = dispatcher.dispatch(&meta, parsed, gates).await {
                        tracing::error!(error = %err, "dispatch failed");
                    }
                }
            }
            ChatEvent::Edited(message) => {
                let _permit = command_permits.acquire().await?;
                let _signal_guard = signal_locks.acquire(message.chat_id).await;
                let lowered = message.text.to_lowercase();
                let reparsed = parser.parse(&message.text);
                let is_reply = message.reply_to_message_id.is_some();
                if let Some(intent) = crate::command_router::classify(&lowered, is_reply, reparsed.as_ref()) {
                    apply_intent(&router, &message, intent, reparsed).await;
                }
            }
            ChatEvent::Deleted { .. } => {}
        }
    }

    lifecycle_task.abort();
    Ok(())
}

async fn apply_intent<B: Broker>(
    router: &CommandRouter<'_, B>,
    message: &crate::ports::ChatMessage,
    intent: crate::command_router::CommandIntent,
    reparsed: Option<crate::domain::ParsedSignal>,
) {
    use crate::command_router::CommandIntent;

    let chat_id = message.chat_id;
    let result = match intent {
        CommandIntent::InlineStopLossUpdate => {
            if let Some(sl) = reparsed.as_ref().map(|p| p.stop_loss) {
                router.update_stop_loss(chat_id, None, sl).await
            } else {
                Ok(())
            }
        }
        CommandIntent::ReplyStopLossUpdate => {
            if let (Some(sl), Some(parent)) = (reparsed.as_ref().map(|p| p.stop_loss), message.reply_to_message_id) {
                router.update_stop_loss(chat_id, Some(parent), sl).await
            } else {
                Ok(())
            }
        }
        CommandIntent::ReplyFullReparse => {
            if let (Some(parsed), Some(parent)) = (reparsed.as_ref(), message.reply_to_message_id) {
                router.apply_reparse(chat_id, parent, parsed).await
            } else {
                Ok(())
            }
        }
        CommandIntent::ReplyDelete { half } => {
            if let Some(parent) = message.reply_to_message_id {
                router.delete(chat_id, parent, half).await
            } else {
                Ok(())
            }
        }
        CommandIntent::ReplyRiskFree => {
            if let Some(parent) = message.reply_to_message_id {
                router.risk_free(chat_id, parent).await
            } else {
                Ok(())
            }
        }
    };

    if let Err(err) = result {
        if err.is_silent_skip() {
            tracing::debug!(error = %err, "command skipped");
        } else {
            tracing::error!(error = %err, "command failed");
        }
    }
}
