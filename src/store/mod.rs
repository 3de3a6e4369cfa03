//! SignalStore (C9).
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/db/mod.rs` for
//! idempotent schema creation (`CREATE TABLE IF NOT EXISTS` with
//! `ON DELETE CASCADE`) and on
//! `original_source/app/Database/repository/Repository.py` for the
//! write-through cache discipline: every mutating call invalidates the
//! cache entries it could have made stale before returning.

pub mod cache;

use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::domain::{Position, Signal};
use crate::errors::Result;
use cache::LruCache;

pub struct SignalStore {
    pool: SqlitePool,
    cache: Option<LruCache>,
}

impl SignalStore {
    pub async fn connect(database_url: &str, enable_cache: bool) -> Result<Self> {
        // SQLite serializes writers regardless; a single pooled connection
        // also keeps `sqlite::memory:` fixtures in integration tests from
        // each landing on a separate, empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_channel_title TEXT NOT NULL,
                source_message_id INTEGER NOT NULL,
                source_chat_id INTEGER NOT NULL,
                open_price REAL NOT NULL,
                second_price REAL,
                stop_loss REAL NOT NULL,
                tp_list TEXT NOT NULL,
                symbol TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal_id INTEGER NOT NULL REFERENCES signals(id) ON DELETE CASCADE,
                broker_ticket INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                is_first INTEGER NOT NULL,
                is_second INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_signal_id ON positions(signal_id)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_chat_message ON signals(source_chat_id, source_message_id)")
            .execute(&pool)
            .await?;

        let cache = if enable_cache {
            Some(LruCache::new(1000, Duration::from_secs(300)))
        } else {
            None
        };

        Ok(Self { pool, cache })
    }

    async fn invalidate_table(&self, table: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_pattern(&format!("{table}:")).await;
        }
    }

    /// Creates a Signal and its first Position as one atomic transaction
    /// (spec.md §4.9: "a crash between inserts must leave no orphan
    /// Signal without its primary Position").
    pub async fn insert_signal_with_first_position(
        &self,
        signal: NewSignal,
        first_ticket: i64,
        user_id: i64,
    ) -> Result<(i64, i64)> {
        let mut tx = self.pool.begin().await?;

        let signal_id = sqlx::query(
            r#"
            INSERT INTO signals
                (source_channel_title, source_message_id, source_chat_id,
                 open_price, second_price, stop_loss, tp_list, symbol, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&signal.source_channel_title)
        .bind(signal.source_message_id)
        .bind(signal.source_chat_id)
        .bind(signal.open_price)
        .bind(signal.second_price)
        .bind(signal.stop_loss)
        .bind(&signal.tp_list)
        .bind(&signal.symbol)
        .bind(&signal.created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let position_id = sqlx::query(
            "INSERT INTO positions (signal_id, broker_ticket, user_id, is_first, is_second) VALUES (?, ?, ?, 1, 0)",
        )
        .bind(signal_id)
        .bind(first_ticket)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        self.invalidate_table("signals").await;
        self.invalidate_table("positions").await;
        Ok((signal_id, position_id))
    }

    pub async fn insert_position(&self, signal_id: i64, ticket: i64, user_id: i64, is_first: bool, is_second: bool) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO positions (signal_id, broker_ticket, user_id, is_first, is_second) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(signal_id)
        .bind(ticket)
        .bind(user_id)
        .bind(is_first)
        .bind(is_second)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        self.invalidate_table("positions").await;
        Ok(id)
    }

    /// Most recent Signal matching all four fields exactly (spec.md §3's
    /// reuse invariant).
    pub async fn find_exact_signal(&self, open: f64, second: Option<f64>, sl: f64, symbol: &str) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, Signal>(
            r#"
            SELECT * FROM signals
            WHERE open_price = ? AND stop_loss = ? AND symbol = ?
              AND ((second_price IS NULL AND ? IS NULL) OR second_price = ?)
            ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(open)
        .bind(sl)
        .bind(symbol)
        .bind(second)
        .bind(second)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_signal_by_chat(&self, chat_id: i64, message_id: i64) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, Signal>(
            "SELECT * FROM signals WHERE source_chat_id = ? AND source_message_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Most recent Signal for a chat regardless of message id — used by
    /// the inline stop-loss update command (spec.md §4.11).
    pub async fn find_latest_signal_by_chat(&self, chat_id: i64) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, Signal>(
            "SELECT * FROM signals WHERE source_chat_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_signal_by_position(&self, broker_ticket: i64) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, Signal>(
            r#"
            SELECT signals.* FROM signals
            JOIN positions ON positions.signal_id = signals.id
            WHERE positions.broker_ticket = ?
            LIMIT 1
            "#,
        )
        .bind(broker_ticket)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn positions_of_signal(&self, signal_id: i64) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, Position>("SELECT * FROM positions WHERE signal_id = ?")
            .bind(signal_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// At most two broker tickets, most recent first, for this chat (and
    /// optionally message id) — spec.md §4.9.
    pub async fn recent_positions_by_chat(&self, chat_id: i64, message_id: Option<i64>) -> Result<Vec<i64>> {
        let rows = if let Some(message_id) = message_id {
            sqlx::query(
                r#"
                SELECT positions.broker_ticket AS ticket FROM positions
                JOIN signals ON signals.id = positions.signal_id
                WHERE signals.source_chat_id = ? AND signals.source_message_id = ?
                ORDER BY positions.id DESC LIMIT 2
                "#,
            )
            .bind(chat_id)
            .bind(message_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT positions.broker_ticket AS ticket FROM positions
                JOIN signals ON signals.id = positions.signal_id
                WHERE signals.source_chat_id = ?
                ORDER BY positions.id DESC LIMIT 2
                "#,
            )
            .bind(chat_id)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows.into_iter().map(|r| r.get::<i64, _>("ticket")).collect())
    }

    pub async fn update_stop_loss(&self, signal_id: i64, sl: f64) -> Result<()> {
        sqlx::query("UPDATE signals SET stop_loss = ? WHERE id = ?")
            .bind(sl)
            .bind(signal_id)
            .execute(&self.pool)
            .await?;
        self.invalidate_table("signals").await;
        Ok(())
    }

    pub async fn update_tp_list(&self, signal_id: i64, tps: &[f64]) -> Result<()> {
        let joined = Signal::join_tp_list(tps);
        sqlx::query("UPDATE signals SET tp_list = ? WHERE id = ?")
            .bind(joined)
            .bind(signal_id)
            .execute(&self.pool)
            .await?;
        self.invalidate_table("signals").await;
        Ok(())
    }

    pub async fn delete_signal(&self, signal_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM signals WHERE id = ?")
            .bind(signal_id)
            .execute(&self.pool)
            .await?;
        self.invalidate_table("signals").await;
        self.invalidate_table("positions").await;
        Ok(())
    }

    /// TP levels for the Signal that owns a given broker ticket.
    pub async fn tp_levels_of_position(&self, broker_ticket: i64) -> Result<Vec<f64>> {
        match self.find_signal_by_position(broker_ticket).await? {
            Some(signal) => Ok(signal.tp_values()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn cache_stats(&self) -> Option<cache::CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }
}

pub struct NewSignal {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal() -> NewSignal {
        NewSignal {
            source_channel_title: "Gold VIP".to_string(),
            source_message_id: 42,
            source_chat_id: 123,
            open_price: 1950.0,
            second_price: None,
            stop_loss: 1945.0,
            tp_list: "1960,1970".to_string(),
            symbol: "XAUUSD".to_string(),
            created_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn inserts_signal_and_first_position_atomically() {
        let store = SignalStore::connect("sqlite::memory:", true).await.unwrap();
        let (signal_id, _position_id) = store
            .insert_signal_with_first_position(sample_signal(), 1001, 7)
            .await
            .unwrap();

        let positions = store.positions_of_signal(signal_id).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert!(positions[0].is_first);
    }

    #[tokio::test]
    async fn find_exact_signal_matches_on_all_four_fields() {
        let store = SignalStore::connect("sqlite::memory:", true).await.unwrap();
        store
            .insert_signal_with_first_position(sample_signal(), 1001, 7)
            .await
            .unwrap();

        let found = store
            .find_exact_signal(1950.0, None, 1945.0, "XAUUSD")
            .await
            .unwrap();
        assert!(found.is_some());

        let not_found = store
            .find_exact_signal(1951.0, None, 1945.0, "XAUUSD")
            .await
            .unwrap();
        assert!(not_found.is_none());
    }

    #[tokio::test]
    async fn delete_signal_cascades_positions() {
        let store = SignalStore::connect("sqlite::memory:", true).await.unwrap();
        let (signal_id, _) = store
            .insert_signal_with_first_position(sample_signal(), 1001, 7)
            .await
            .unwrap();

        store.delete_signal(signal_id).await.unwrap();
        let positions = store.positions_of_signal(signal_id).await.unwrap();
        assert!(positions.is_empty());
    }
}
