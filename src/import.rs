//! Bulk trade import: parsing, validation and duplicate detection for broker exports.
//!
//! A batch is a JSON document, either a bare array of trade items or an object
//! with a `trades` array and an optional `trading_account_id`. Items are
//! validated one at a time so a single bad row does not reject the batch.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{Trade, TradeType};

/// Single trade item as exported by the broker terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkTradeItem {
    #[serde(default)]
    pub ticket: Option<i64>,

    pub symbol: String,

    #[serde(alias = "type")]
    pub trade_type: String,

    #[serde(default)]
    pub volume: Decimal,

    #[serde(deserialize_with = "timestamp")]
    pub open_time: DateTime<Utc>,

    #[serde(default)]
    pub open_price: Decimal,

    #[serde(default, deserialize_with = "optional_timestamp")]
    pub close_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub close_price: Option<Decimal>,

    #[serde(default)]
    pub stop_loss: Option<Decimal>,

    #[serde(default)]
    pub take_profit: Option<Decimal>,

    #[serde(default)]
    pub profit: Option<Decimal>,

    #[serde(default)]
    pub commission: Option<Decimal>,

    #[serde(default)]
    pub swap: Option<Decimal>,

    #[serde(default)]
    pub comment: Option<String>,
}

/// Raw batch read from a file, before per-item validation.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub trading_account_id: Option<Uuid>,
    pub items: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchDocument {
    Wrapped {
        #[serde(default, alias = "tradingAccountId")]
        trading_account_id: Option<Uuid>,
        trades: Vec<Value>,
    },
    Bare(Vec<Value>),
}

/// Why a single item was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub index: usize,
    pub ticket: Option<i64>,
    pub message: String,
}

/// Outcome of an import batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub total_submitted: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub error_details: Vec<ItemError>,
    /// Validated only; `imported` counts trades that would have been stored
    pub dry_run: bool,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    pub fn mark_dry_run(&mut self) {
        self.dry_run = true;
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Import Summary ===")?;
        writeln!(f, "Submitted:   {}", self.total_submitted)?;
        if self.dry_run {
            writeln!(f, "Would import: {} (dry run, nothing stored)", self.imported)?;
        } else {
            writeln!(f, "Imported:    {}", self.imported)?;
        }
        writeln!(f, "Duplicates:  {}", self.duplicates)?;
        writeln!(f, "Errors:      {}", self.errors)?;
        for err in &self.error_details {
            let ticket = err.ticket.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
            writeln!(f, "  #{} (ticket {}): {}", err.index, ticket, err.message)?;
        }
        Ok(())
    }
}

/// Trades ready to be stored plus the report describing what was skipped.
#[derive(Debug, Clone)]
pub struct PreparedImport {
    pub trades: Vec<Trade>,
    pub report: ImportReport,
}

/// Validates and normalizes broker trade items into journal trades.
pub struct TradeImporter {
    max_batch: usize,
    max_symbol_len: usize,
}

impl TradeImporter {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_batch: config.max_import_batch,
            max_symbol_len: config.max_symbol_len,
        }
    }

    /// Turn raw items into trades for `account_id`.
    ///
    /// Tickets already in `existing_tickets`, or repeated within the batch,
    /// are counted as duplicates. Fails only when the batch size is out of range.
    pub fn prepare(
        &self,
        account_id: Uuid,
        items: Vec<Value>,
        existing_tickets: &HashSet<i64>,
    ) -> Result<PreparedImport> {
        if items.is_empty() {
            anyhow::bail!("At least one trade required");
        }
        if items.len() > self.max_batch {
            anyhow::bail!("Maximum {} trades per batch, got {}", self.max_batch, items.len());
        }

        let mut report = ImportReport {
            total_submitted: items.len(),
            ..Default::default()
        };
        let mut seen = existing_tickets.clone();
        let mut trades = Vec::with_capacity(items.len());

        for (index, raw) in items.into_iter().enumerate() {
            let ticket = raw.get("ticket").and_then(Value::as_i64);

            let result = serde_json::from_value::<BulkTradeItem>(raw)
                .context("Malformed trade item")
                .and_then(|item| {
                    if let Some(t) = item.ticket {
                        if seen.contains(&t) {
                            return Ok(None);
                        }
                    }
                    self.to_trade(account_id, item).map(Some)
                });

            match result {
                Ok(Some(trade)) => {
                    if let Some(t) = trade.ticket {
                        seen.insert(t);
                    }
                    trades.push(trade);
                }
                Ok(None) => {
                    debug!(index, ticket = ?ticket, "Skipping duplicate ticket");
                    report.duplicates += 1;
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    warn!(index, ticket = ?ticket, error = %message, "Rejected trade item");
                    report.errors += 1;
                    report.error_details.push(ItemError {
                        index,
                        ticket,
                        message,
                    });
                }
            }
        }

        report.imported = trades.len();
        Ok(PreparedImport { trades, report })
    }

    fn to_trade(&self, account_id: Uuid, item: BulkTradeItem) -> Result<Trade> {
        let trade_type: TradeType = item.trade_type.parse()?;

        if item.volume <= Decimal::ZERO {
            anyhow::bail!("volume must be positive");
        }

        let symbol = clean_symbol(&item.symbol, self.max_symbol_len);
        if symbol.is_empty() {
            anyhow::bail!("symbol is empty");
        }
        if symbol != item.symbol {
            debug!(original = %item.symbol, cleaned = %symbol, "Symbol cleaned");
        }

        let mut trade = Trade::new(account_id, symbol, trade_type);
        trade.ticket = item.ticket;
        trade.volume = item.volume;
        trade.open_price = item.open_price;
        trade.close_price = item.close_price;
        trade.stop_loss = item.stop_loss;
        trade.take_profit = item.take_profit;
        trade.profit = item.profit.unwrap_or_default();
        trade.commission = item.commission.unwrap_or_default();
        trade.swap = item.swap.unwrap_or_default();
        trade.open_time = Some(item.open_time);
        trade.close_time = item.close_time;
        trade.comment = item.comment;
        Ok(trade)
    }
}

/// Read a batch document from disk.
pub fn load_batch_file(path: &Path) -> Result<ImportBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_batch(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse a batch document (wrapped object or bare array).
pub fn parse_batch(raw: &str) -> Result<ImportBatch> {
    let doc: BatchDocument = serde_json::from_str(raw)
        .context("Expected a JSON array of trades or an object with a `trades` array")?;

    Ok(match doc {
        BatchDocument::Wrapped {
            trading_account_id,
            trades,
        } => ImportBatch {
            trading_account_id,
            items: trades,
        },
        BatchDocument::Bare(items) => ImportBatch {
            trading_account_id: None,
            items,
        },
    })
}

/// Drop parenthesised suffixes (e.g. "EURUSD (ECN)"), trim, and cap the length.
pub fn clean_symbol(raw: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;

    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out.trim().chars().take(max_len).collect()
}

/// Parse RFC 3339, broker-style `YYYY.MM.DD HH:MM:SS`, `YYYY-MM-DD HH:MM:SS`,
/// or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Ok(naive.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y.%m.%d"))
        .with_context(|| format!("Unrecognized timestamp: {:?}", raw))?;
    let midnight = date.and_hms_opt(0, 0, 0).context("Invalid date")?;
    Ok(midnight.and_utc())
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            parse_timestamp(&raw).map(Some).map_err(serde::de::Error::custom)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn importer() -> TradeImporter {
        TradeImporter::new(&AppConfig::default())
    }

    fn item(ticket: i64, trade_type: &str, volume: f64) -> Value {
        json!({
            "ticket": ticket,
            "symbol": "EURUSD",
            "trade_type": trade_type,
            "volume": volume,
            "open_time": "2024.03.04 10:15:00",
            "open_price": 1.0850,
            "close_time": "2024-03-04T12:00:00Z",
            "close_price": 1.0900,
            "profit": 50.0,
            "commission": -3.5
        })
    }

    #[test]
    fn test_prepare_valid_items() {
        let account = Uuid::new_v4();
        let prepared = importer()
            .prepare(account, vec![item(1, "BUY", 0.5), item(2, "sell", 1.0)], &HashSet::new())
            .unwrap();

        assert_eq!(prepared.report.total_submitted, 2);
        assert_eq!(prepared.report.imported, 2);
        assert!(prepared.report.is_success());

        let first = &prepared.trades[0];
        assert_eq!(first.trading_account_id, account);
        assert_eq!(first.trade_type, TradeType::Buy);
        assert_eq!(first.ticket, Some(1));
        assert_eq!(first.commission, dec!(-3.5));
        assert_eq!(first.swap, Decimal::ZERO);
        assert_eq!(
            first.open_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 10, 15, 0).unwrap())
        );
        assert_eq!(prepared.trades[1].trade_type, TradeType::Sell);
    }

    #[test]
    fn test_duplicates_against_store_and_batch() {
        let existing: HashSet<i64> = [7].into_iter().collect();
        let prepared = importer()
            .prepare(
                Uuid::new_v4(),
                vec![item(7, "buy", 1.0), item(8, "buy", 1.0), item(8, "sell", 1.0)],
                &existing,
            )
            .unwrap();

        assert_eq!(prepared.report.duplicates, 2);
        assert_eq!(prepared.report.imported, 1);
        assert_eq!(prepared.trades[0].ticket, Some(8));
    }

    #[test]
    fn test_invalid_items_are_reported() {
        let mut missing_time = item(3, "buy", 1.0);
        missing_time.as_object_mut().unwrap().remove("open_time");

        let prepared = importer()
            .prepare(
                Uuid::new_v4(),
                vec![item(1, "hold", 1.0), item(2, "buy", 0.0), missing_time, item(4, "sell", 2.0)],
                &HashSet::new(),
            )
            .unwrap();

        assert_eq!(prepared.report.errors, 3);
        assert_eq!(prepared.report.imported, 1);
        let indexes: Vec<_> = prepared.report.error_details.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(prepared.report.error_details[1].ticket, Some(2));
        assert!(!prepared.report.is_success());
    }

    #[test]
    fn test_dry_run_report_stores_nothing() {
        let items = vec![item(1, "buy", 1.0), item(2, "sell", 1.0)];
        let mut prepared = importer().prepare(Uuid::new_v4(), items, &HashSet::new()).unwrap();

        let stored = prepared.report.to_string();
        assert!(stored.contains("Imported:    2"));

        prepared.report.mark_dry_run();
        let summary = prepared.report.to_string();
        assert!(summary.contains("Would import: 2 (dry run, nothing stored)"));
        assert!(!summary.contains("Imported:"));
    }

    #[test]
    fn test_batch_size_limits() {
        assert!(importer().prepare(Uuid::new_v4(), vec![], &HashSet::new()).is_err());

        let config = AppConfig {
            max_import_batch: 2,
            ..Default::default()
        };
        let small = TradeImporter::new(&config);
        let items = vec![item(1, "buy", 1.0), item(2, "buy", 1.0), item(3, "buy", 1.0)];
        assert!(small.prepare(Uuid::new_v4(), items, &HashSet::new()).is_err());
    }

    #[test]
    fn test_clean_symbol() {
        assert_eq!(clean_symbol("EURUSD (ECN)", 20), "EURUSD");
        assert_eq!(clean_symbol("  XAUUSD.m ", 20), "XAUUSD.m");
        assert_eq!(clean_symbol("US30(cash)(x)", 20), "US30");
        assert_eq!(clean_symbol("ABCDEFGHIJKLMNOPQRSTUVWXYZ", 20), "ABCDEFGHIJKLMNOPQRST");
    }

    #[test]
    fn test_parse_batch_shapes() {
        let account = Uuid::new_v4();
        let wrapped = format!(
            r#"{{"trading_account_id": "{}", "trades": [{{"ticket": 1}}]}}"#,
            account
        );
        let batch = parse_batch(&wrapped).unwrap();
        assert_eq!(batch.trading_account_id, Some(account));
        assert_eq!(batch.items.len(), 1);

        let bare = parse_batch(r#"[{"ticket": 1}, {"ticket": 2}]"#).unwrap();
        assert_eq!(bare.trading_account_id, None);
        assert_eq!(bare.items.len(), 2);

        assert!(parse_batch(r#"{"nope": true}"#).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-01T08:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-06-01T10:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024.06.01 08:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-06-01 08:30:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-06-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
