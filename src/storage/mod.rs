//! Durable storage
//!
//! One SQLite database holds the trade ledger and the per-bot configuration
//! records. Writes are per-field and idempotent so an aborted cycle never
//! leaves half-applied state.

pub mod bots;
pub mod trades;

pub use trades::{TradeRecord, TradeStatus};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                pair TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                entry_time TEXT NOT NULL,
                exit_time TEXT,
                realized_pnl REAL,
                peak_profit_percent REAL NOT NULL DEFAULT 0.0,
                peak_updated_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_bot_status ON trades (bot_id, status);
            CREATE INDEX IF NOT EXISTS idx_trades_pair ON trades (pair);

            CREATE TABLE IF NOT EXISTS bots (
                bot_id TEXT PRIMARY KEY,
                config TEXT NOT NULL DEFAULT '{}'
            );",
        )
        .context("failed to initialize database schema")?;
        Ok(())
    }
}
