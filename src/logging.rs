//! Tracing setup and the notification-sink bridge.
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/bootstrap/logging.rs`:
//! a `tracing_subscriber` registry with an env-filter layer plus an fmt
//! layer, initialized once. The notification sink (spec.md §6) is wired the
//! same way that crate's log-buffer layer forwards records to a channel —
//! here a custom `Layer` forwards WARN+ events to an `mpsc::Sender<String>` that a
//! `NotificationSink` adapter drains.

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Captures the `message` field of a tracing event into a plain string.
#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Forwards WARN-and-above events to a bounded channel, decoupling log
/// emission from however slowly the notification sink's transport drains.
pub struct NotificationLayer {
    sender: mpsc::Sender<String>,
}

impl NotificationLayer {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl<S> Layer<S> for NotificationLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let line = format!("[{}] {}", event.metadata().level(), visitor.0);
        // A full channel means the sink is behind; drop rather than block
        // the calling task, since notifications are best-effort.
        let _ = self.sender.try_send(line);
    }
}

/// Initializes the global subscriber: env-filter (`RUST_LOG`, defaulting to
/// `info`) plus an fmt layer, plus the notification layer. Returns the
/// receiver half so the caller can hand it to a `NotificationSink`.
pub fn init(capacity: usize) -> mpsc::Receiver<String> {
    let (notify_layer, receiver) = NotificationLayer::new(capacity);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(notify_layer);

    tracing::subscriber::set_global_default(subscriber)
        .expect("tracing subscriber already initialized");

    receiver
}
