//! Predicate filtering of trades by date, symbol, type and profit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Trade, TradeType};

/// Inclusive time window; either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Inclusive profit window; either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

/// Filter criteria. Every set dimension must match (AND); unset or empty
/// dimensions match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFilters {
    #[serde(default)]
    pub date_range: DateRange,

    #[serde(default)]
    pub symbols: Vec<String>,

    #[serde(default)]
    pub trade_types: Vec<TradeType>,

    #[serde(default)]
    pub profit_range: Option<ProfitRange>,
}

impl DateRange {
    fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn contains(&self, time: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(time) = time else {
            return false;
        };
        self.start.map_or(true, |start| time >= start) && self.end.map_or(true, |end| time <= end)
    }
}

impl ProfitRange {
    fn contains(&self, profit: Decimal) -> bool {
        self.min.map_or(true, |min| profit >= min) && self.max.map_or(true, |max| profit <= max)
    }
}

impl TradeFilters {
    /// True when no dimension constrains anything.
    pub fn is_empty(&self) -> bool {
        self.date_range.is_unbounded()
            && self.symbols.is_empty()
            && self.trade_types.is_empty()
            && self.profit_range.is_none()
    }

    /// Whether a single trade passes every set dimension.
    pub fn matches(&self, trade: &Trade) -> bool {
        self.date_range.contains(trade.entry_time())
            && (self.symbols.is_empty()
                || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(&trade.symbol)))
            && (self.trade_types.is_empty() || self.trade_types.contains(&trade.trade_type))
            && self
                .profit_range
                .as_ref()
                .map_or(true, |range| range.contains(trade.profit))
    }
}

/// Keep the trades that match `filters`, preserving input order.
pub fn apply_filters(trades: &[Trade], filters: &TradeFilters) -> Vec<Trade> {
    trades.iter().filter(|t| filters.matches(t)).cloned().collect()
}
