//! Trade ledger
//!
//! Timestamps are stored as offset-less `YYYY-MM-DD HH:MM:SS` text and are
//! always UTC. `parse_storage_timestamp` also accepts RFC 3339 so rows
//! written by other tools still load; an offset-less value MUST be read as
//! UTC, never local time.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Row};

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TradeStatus::Open),
            "closed" => Ok(TradeStatus::Closed),
            other => anyhow::bail!("unknown trade status: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub id: i64,
    pub bot_id: String,
    pub pair: String,
    pub status: TradeStatus,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Realized P&L in quote currency, set on close
    pub realized_pnl: Option<f64>,
    pub peak_profit_percent: f64,
    pub peak_updated_at: Option<DateTime<Utc>>,
}

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_storage_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp. Offset-less values are interpreted as UTC.
pub fn parse_storage_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .with_context(|| format!("unparseable stored timestamp: {}", s))?;
    Ok(naive.and_utc())
}

fn row_to_trade(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
    let status: String = row.get("status")?;
    let entry_time: String = row.get("entry_time")?;
    let exit_time: Option<String> = row.get("exit_time")?;
    let peak_updated_at: Option<String> = row.get("peak_updated_at")?;

    let parse = |s: &str| {
        parse_storage_timestamp(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })
    };

    Ok(TradeRecord {
        id: row.get("id")?,
        bot_id: row.get("bot_id")?,
        pair: row.get("pair")?,
        status: TradeStatus::parse(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        entry_time: parse(&entry_time)?,
        exit_time: exit_time.as_deref().map(parse).transpose()?,
        realized_pnl: row.get("realized_pnl")?,
        peak_profit_percent: row.get("peak_profit_percent")?,
        peak_updated_at: peak_updated_at.as_deref().map(parse).transpose()?,
    })
}

impl Store {
    pub fn insert_trade(
        &self,
        bot_id: &str,
        pair: &str,
        entry_time: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO trades (bot_id, pair, status, entry_time) VALUES (?1, ?2, 'open', ?3)",
            params![bot_id, pair, format_storage_timestamp(entry_time)],
        )
        .context("failed to insert trade")?;
        Ok(conn.last_insert_rowid())
    }

    /// All currently open trades, for startup hydration
    pub fn open_trades(&self) -> Result<Vec<TradeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM trades WHERE status = 'open' ORDER BY entry_time ASC",
        )?;
        let rows = stmt.query_map([], row_to_trade)?;
        let mut trades = Vec::new();
        for trade in rows {
            trades.push(trade.context("failed to parse open trade row")?);
        }
        Ok(trades)
    }

    pub fn get_trade(&self, trade_id: i64) -> Result<Option<TradeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM trades WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![trade_id], row_to_trade)?;
        match rows.next() {
            Some(trade) => Ok(Some(trade.context("failed to parse trade row")?)),
            None => Ok(None),
        }
    }

    /// Persist a new peak high-water mark. Idempotent per (trade, value).
    pub fn update_peak_profit(&self, trade_id: i64, peak_pct: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE trades SET peak_profit_percent = ?1, peak_updated_at = ?2 WHERE id = ?3",
            params![peak_pct, format_storage_timestamp(Utc::now()), trade_id],
        )
        .context("failed to persist peak profit")?;
        Ok(())
    }

    pub fn close_trade(
        &self,
        trade_id: i64,
        exit_time: DateTime<Utc>,
        realized_pnl: f64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE trades SET status = 'closed', exit_time = ?1, realized_pnl = ?2 WHERE id = ?3",
            params![format_storage_timestamp(exit_time), realized_pnl, trade_id],
        )
        .context("failed to close trade")?;
        Ok(())
    }

    /// Closed trades for one bot since a cutoff, oldest first
    pub fn closed_trades_since(
        &self,
        bot_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM trades
             WHERE bot_id = ?1 AND status = 'closed' AND exit_time >= ?2
             ORDER BY exit_time ASC",
        )?;
        let rows = stmt.query_map(
            params![bot_id, format_storage_timestamp(since)],
            row_to_trade,
        )?;
        let mut trades = Vec::new();
        for trade in rows {
            trades.push(trade.context("failed to parse closed trade row")?);
        }
        Ok(trades)
    }

    /// Most recent closed trades for one bot, newest first
    pub fn recent_closed_trades(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM trades
             WHERE bot_id = ?1 AND status = 'closed'
             ORDER BY exit_time DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![bot_id, limit as i64], row_to_trade)?;
        let mut trades = Vec::new();
        for trade in rows {
            trades.push(trade.context("failed to parse closed trade row")?);
        }
        Ok(trades)
    }

    /// Cumulative realized P&L over every closed trade of one bot
    pub fn total_realized_pnl(&self, bot_id: &str) -> Result<f64> {
        let conn = self.conn.lock();
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(realized_pnl), 0.0) FROM trades
             WHERE bot_id = ?1 AND status = 'closed'",
            params![bot_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Latest closed trade on a pair, for the re-entry cooldown
    pub fn last_closed_trade_for_pair(
        &self,
        bot_id: &str,
        pair: &str,
    ) -> Result<Option<TradeRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM trades
             WHERE bot_id = ?1 AND pair = ?2 AND status = 'closed'
             ORDER BY exit_time DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![bot_id, pair], row_to_trade)?;
        match rows.next() {
            Some(trade) => Ok(Some(trade.context("failed to parse closed trade row")?)),
            None => Ok(None),
        }
    }
}
