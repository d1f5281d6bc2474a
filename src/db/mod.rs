//! Database persistence for trading accounts and their journaled trades.
//!
//! Monetary values are stored as decimal strings so they survive the round
//! trip exactly; timestamps are stored as RFC 3339 text.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Trade, TradingAccount};

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Stored trading account record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredAccount {
    pub id: String,
    pub account_name: String,
    pub account_number: Option<String>,
    pub broker: Option<String>,
    pub currency: String,
    pub starting_balance: String,
    pub is_active: bool,
    pub created_at: String,
}

/// Stored trade record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub id: String,
    pub trading_account_id: String,
    pub ticket: Option<i64>,
    pub symbol: String,
    #[sqlx(rename = "type")]
    pub trade_type: String,
    pub volume: String,
    pub open_price: String,
    pub close_price: Option<String>,
    pub stop_loss: Option<String>,
    pub take_profit: Option<String>,
    pub profit: String,
    pub commission: String,
    pub swap: String,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub comment: Option<String>,
}

impl Database {
    /// Create a new database connection and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_accounts (
                id TEXT PRIMARY KEY,
                account_name TEXT NOT NULL,
                account_number TEXT,
                broker TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                starting_balance TEXT NOT NULL DEFAULT '0',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                trading_account_id TEXT NOT NULL,
                ticket INTEGER,
                symbol TEXT NOT NULL,
                type TEXT NOT NULL,
                volume TEXT NOT NULL DEFAULT '0',
                open_price TEXT NOT NULL DEFAULT '0',
                close_price TEXT,
                stop_loss TEXT,
                take_profit TEXT,
                profit TEXT NOT NULL DEFAULT '0',
                commission TEXT NOT NULL DEFAULT '0',
                swap TEXT NOT NULL DEFAULT '0',
                open_time TEXT,
                close_time TEXT,
                comment TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(trading_account_id, ticket),
                FOREIGN KEY (trading_account_id) REFERENCES trading_accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_account ON trades(trading_account_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Accounts ====================

    /// Save a new trading account.
    pub async fn create_account(&self, account: &TradingAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trading_accounts
                (id, account_name, account_number, broker, currency, starting_balance, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.account_name)
        .bind(&account.account_number)
        .bind(&account.broker)
        .bind(&account.currency)
        .bind(account.starting_balance.to_string())
        .bind(account.is_active)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save trading account")?;

        Ok(())
    }

    /// Get all trading accounts, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<TradingAccount>> {
        let rows = sqlx::query_as::<_, StoredAccount>(
            "SELECT * FROM trading_accounts ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TradingAccount::try_from).collect()
    }

    /// Get a single trading account.
    pub async fn get_account(&self, id: Uuid) -> Result<Option<TradingAccount>> {
        let row = sqlx::query_as::<_, StoredAccount>("SELECT * FROM trading_accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TradingAccount::try_from).transpose()
    }

    // ==================== Trades ====================

    /// Broker tickets already stored for an account.
    pub async fn existing_tickets(&self, account_id: Uuid) -> Result<HashSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT ticket FROM trades WHERE trading_account_id = ? AND ticket IS NOT NULL",
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// Insert trades in a single transaction. Returns the number of rows written.
    pub async fn insert_trades(&self, trades: &[Trade]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades (
                    id, trading_account_id, ticket, symbol, type, volume,
                    open_price, close_price, stop_loss, take_profit,
                    profit, commission, swap, open_time, close_time, comment
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(trade.id.to_string())
            .bind(trade.trading_account_id.to_string())
            .bind(trade.ticket)
            .bind(&trade.symbol)
            .bind(trade.trade_type.as_str())
            .bind(trade.volume.to_string())
            .bind(trade.open_price.to_string())
            .bind(trade.close_price.map(|d| d.to_string()))
            .bind(trade.stop_loss.map(|d| d.to_string()))
            .bind(trade.take_profit.map(|d| d.to_string()))
            .bind(trade.profit.to_string())
            .bind(trade.commission.to_string())
            .bind(trade.swap.to_string())
            .bind(trade.open_time.map(|t| t.to_rfc3339()))
            .bind(trade.close_time.map(|t| t.to_rfc3339()))
            .bind(&trade.comment)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert trade {}", trade.id))?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!(rows = written, "Stored trades");
        Ok(written)
    }

    /// Get every trade of an account, ordered by open time.
    pub async fn get_trades(&self, account_id: Uuid) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, StoredTrade>(
            r#"
            SELECT id, trading_account_id, ticket, symbol, type, volume,
                   open_price, close_price, stop_loss, take_profit,
                   profit, commission, swap, open_time, close_time, comment
            FROM trades
            WHERE trading_account_id = ?
            ORDER BY open_time, created_at
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    /// Delete every trade of an account. Returns the number of rows removed.
    pub async fn delete_trades(&self, account_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM trades WHERE trading_account_id = ?")
            .bind(account_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("Invalid decimal in {}: {:?}", field, raw))
}

fn parse_optional_decimal(field: &str, raw: Option<String>) -> Result<Option<Decimal>> {
    raw.map(|r| parse_decimal(field, &r)).transpose()
}

fn parse_time(field: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid timestamp in {}: {:?}", field, r))
    })
    .transpose()
}

impl TryFrom<StoredAccount> for TradingAccount {
    type Error = anyhow::Error;

    fn try_from(row: StoredAccount) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).context("Invalid account id")?,
            starting_balance: parse_decimal("starting_balance", &row.starting_balance)?,
            created_at: parse_time("created_at", Some(row.created_at))?.unwrap_or_else(Utc::now),
            account_name: row.account_name,
            account_number: row.account_number,
            broker: row.broker,
            currency: row.currency,
            is_active: row.is_active,
        })
    }
}

impl TryFrom<StoredTrade> for Trade {
    type Error = anyhow::Error;

    fn try_from(row: StoredTrade) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).context("Invalid trade id")?,
            trading_account_id: Uuid::parse_str(&row.trading_account_id)
                .context("Invalid trading account id")?,
            ticket: row.ticket,
            trade_type: row.trade_type.parse()?,
            volume: parse_decimal("volume", &row.volume)?,
            open_price: parse_decimal("open_price", &row.open_price)?,
            close_price: parse_optional_decimal("close_price", row.close_price)?,
            stop_loss: parse_optional_decimal("stop_loss", row.stop_loss)?,
            take_profit: parse_optional_decimal("take_profit", row.take_profit)?,
            profit: parse_decimal("profit", &row.profit)?,
            commission: parse_decimal("commission", &row.commission)?,
            swap: parse_decimal("swap", &row.swap)?,
            open_time: parse_time("open_time", row.open_time)?,
            close_time: parse_time("close_time", row.close_time)?,
            symbol: row.symbol,
            comment: row.comment,
        })
    }
}
