//! Profitability breakdowns by hour of day, trading session, weekday, month and symbol.

use std::collections::BTreeMap;

use chrono::{Datelike, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::metrics::calculator::saturating_sum;
use crate::models::Trade;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Trading sessions by UTC open hour, `[start, end)`. Sessions overlap.
const SESSIONS: [(&str, u32, u32); 4] = [
    ("Asian", 0, 8),
    ("European", 7, 16),
    ("US", 13, 22),
    ("EU/US Overlap", 13, 16),
];

/// Aggregate of net profit over one bucket of trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub profit: Decimal,
    pub trade_count: u32,
    /// Share of trades with positive net profit, in percent
    pub win_rate: f64,
    pub avg_profit: Decimal,
}

impl BucketStats {
    fn from_trades(trades: &[&Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let count = trades.len() as u32;
        let profit = saturating_sum(trades.iter().map(|t| t.net_profit()));
        let winners = trades.iter().filter(|t| t.net_profit() > Decimal::ZERO).count();

        Self {
            profit,
            trade_count: count,
            win_rate: winners as f64 / count as f64 * 100.0,
            avg_profit: profit / Decimal::from(count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRow {
    pub hour: u32,
    #[serde(flatten)]
    pub stats: BucketStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayRow {
    pub day: &'static str,
    /// 0 = Monday
    pub day_index: u32,
    #[serde(flatten)]
    pub stats: BucketStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRow {
    pub session: &'static str,
    /// First UTC hour of the session
    pub start_hour: u32,
    /// UTC hour the session ends, exclusive
    pub end_hour: u32,
    #[serde(flatten)]
    pub stats: BucketStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    pub month: &'static str,
    /// 1 = January
    pub month_number: u32,
    #[serde(flatten)]
    pub stats: BucketStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRow {
    pub symbol: String,
    #[serde(flatten)]
    pub stats: BucketStats,
    /// Sample standard deviation of net profit over |average net profit|
    pub risk_score: f64,
}

/// One row per hour (0..24) of the trades' open time. Untimed trades are skipped.
pub fn hourly_breakdown(trades: &[Trade]) -> Vec<HourlyRow> {
    let mut buckets: [Vec<&Trade>; 24] = Default::default();
    for trade in trades {
        if let Some(time) = trade.entry_time() {
            buckets[time.hour() as usize].push(trade);
        }
    }

    buckets
        .iter()
        .enumerate()
        .map(|(hour, bucket)| HourlyRow {
            hour: hour as u32,
            stats: BucketStats::from_trades(bucket),
        })
        .collect()
}

/// One row per trading session. A trade opened during an overlap counts in every
/// session covering its hour. Untimed trades are skipped.
pub fn session_breakdown(trades: &[Trade]) -> Vec<SessionRow> {
    SESSIONS
        .iter()
        .map(|&(session, start_hour, end_hour)| {
            let bucket: Vec<&Trade> = trades
                .iter()
                .filter(|t| {
                    t.entry_time()
                        .map_or(false, |time| (start_hour..end_hour).contains(&time.hour()))
                })
                .collect();

            SessionRow {
                session,
                start_hour,
                end_hour,
                stats: BucketStats::from_trades(&bucket),
            }
        })
        .collect()
}

/// One row per weekday, Monday first. Untimed trades are skipped.
pub fn weekday_breakdown(trades: &[Trade]) -> Vec<WeekdayRow> {
    let mut buckets: [Vec<&Trade>; 7] = Default::default();
    for trade in trades {
        if let Some(time) = trade.entry_time() {
            buckets[time.weekday().num_days_from_monday() as usize].push(trade);
        }
    }

    buckets
        .iter()
        .enumerate()
        .map(|(idx, bucket)| WeekdayRow {
            day: WEEKDAYS[idx],
            day_index: idx as u32,
            stats: BucketStats::from_trades(bucket),
        })
        .collect()
}

/// One row per calendar month, January first, pooling every year. Untimed trades are skipped.
pub fn monthly_breakdown(trades: &[Trade]) -> Vec<MonthlyRow> {
    let mut buckets: [Vec<&Trade>; 12] = Default::default();
    for trade in trades {
        if let Some(time) = trade.entry_time() {
            buckets[time.month0() as usize].push(trade);
        }
    }

    buckets
        .iter()
        .enumerate()
        .map(|(idx, bucket)| MonthlyRow {
            month: MONTHS[idx],
            month_number: idx as u32 + 1,
            stats: BucketStats::from_trades(bucket),
        })
        .collect()
}

/// One row per traded symbol, most profitable first.
pub fn symbol_breakdown(trades: &[Trade]) -> Vec<SymbolRow> {
    let mut by_symbol: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        by_symbol.entry(trade.symbol.as_str()).or_default().push(trade);
    }

    let mut rows: Vec<SymbolRow> = by_symbol
        .into_iter()
        .map(|(symbol, bucket)| {
            let stats = BucketStats::from_trades(&bucket);
            let risk_score = risk_score(&bucket, stats.avg_profit);
            SymbolRow {
                symbol: symbol.to_string(),
                stats,
                risk_score,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.stats.profit.cmp(&a.stats.profit));
    rows
}

/// Profit dispersion relative to the mean; 0 when either is undefined.
fn risk_score(trades: &[&Trade], avg_profit: Decimal) -> f64 {
    let avg = avg_profit.to_f64().unwrap_or(0.0);
    if trades.len() < 2 || avg == 0.0 {
        return 0.0;
    }

    let std_dev = trades
        .iter()
        .filter_map(|t| t.net_profit().to_f64())
        .collect::<Vec<f64>>()
        .std_dev();

    let score = std_dev / avg.abs();
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeType;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    // 2024-01-01 is a Monday
    fn trade(symbol: &str, day: u32, hour: u32, profit: Decimal) -> Trade {
        let mut trade = Trade::new(Uuid::nil(), symbol, TradeType::Buy);
        trade.profit = profit;
        trade.open_time = Some(Utc.with_ymd_and_hms(2024, 1, day, hour, 15, 0).unwrap());
        trade
    }

    #[test]
    fn test_hourly_has_every_hour() {
        let trades = vec![
            trade("EURUSD", 1, 9, dec!(10)),
            trade("EURUSD", 2, 9, dec!(-4)),
            trade("EURUSD", 2, 14, dec!(6)),
        ];

        let rows = hourly_breakdown(&trades);
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[9].stats.trade_count, 2);
        assert_eq!(rows[9].stats.profit, dec!(6));
        assert_eq!(rows[9].stats.avg_profit, dec!(3));
        assert_eq!(rows[9].stats.win_rate, 50.0);
        assert_eq!(rows[14].stats.trade_count, 1);
        assert_eq!(rows[0], HourlyRow { hour: 0, stats: BucketStats::default() });
    }

    #[test]
    fn test_weekday_uses_net_profit() {
        let mut costly = trade("EURUSD", 3, 10, dec!(5));
        costly.commission = dec!(-7);

        let rows = weekday_breakdown(&[costly, trade("EURUSD", 7, 10, dec!(1))]);
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[2].day, "Wed");
        assert_eq!(rows[2].stats.profit, dec!(-2));
        assert_eq!(rows[2].stats.win_rate, 0.0);
        assert_eq!(rows[6].day, "Sun");
        assert_eq!(rows[6].stats.trade_count, 1);
    }

    #[test]
    fn test_sessions_overlap() {
        let trades = vec![
            trade("EURUSD", 1, 3, dec!(10)),  // Asian
            trade("EURUSD", 1, 7, dec!(-2)),  // Asian + European
            trade("EURUSD", 2, 14, dec!(8)),  // European + US + overlap
            trade("EURUSD", 2, 21, dec!(-4)), // US
            trade("EURUSD", 3, 23, dec!(50)), // outside every session
        ];

        let rows = session_breakdown(&trades);
        let by_name = |name: &str| rows.iter().find(|r| r.session == name).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(by_name("Asian").stats.trade_count, 2);
        assert_eq!(by_name("Asian").stats.profit, dec!(8));
        assert_eq!(by_name("European").stats.trade_count, 2);
        assert_eq!(by_name("European").stats.profit, dec!(6));
        assert_eq!(by_name("US").stats.trade_count, 2);
        assert_eq!(by_name("US").stats.win_rate, 50.0);

        let overlap = by_name("EU/US Overlap");
        assert_eq!(overlap.stats.trade_count, 1);
        assert_eq!(overlap.stats.profit, dec!(8));
        assert_eq!((overlap.start_hour, overlap.end_hour), (13, 16));
    }

    #[test]
    fn test_monthly_pools_years() {
        let mut last_march = trade("EURUSD", 4, 10, dec!(-3));
        last_march.open_time = Some(Utc.with_ymd_and_hms(2023, 3, 10, 10, 0, 0).unwrap());
        let mut this_march = trade("EURUSD", 4, 10, dec!(9));
        this_march.open_time = Some(Utc.with_ymd_and_hms(2024, 3, 22, 10, 0, 0).unwrap());
        let untimed = Trade::new(Uuid::nil(), "EURUSD", TradeType::Sell);

        let january = trade("EURUSD", 5, 9, dec!(1));

        let rows = monthly_breakdown(&[last_march, this_march, january, untimed]);
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].month, "Jan");
        assert_eq!(rows[0].stats.trade_count, 1);
        assert_eq!(rows[2].month_number, 3);
        assert_eq!(rows[2].stats.trade_count, 2);
        assert_eq!(rows[2].stats.profit, dec!(6));
        assert_eq!(rows[2].stats.avg_profit, dec!(3));
        assert_eq!(rows[11].stats, BucketStats::default());
    }

    #[test]
    fn test_extreme_bucket_saturates() {
        let trades = vec![trade("EURUSD", 1, 9, Decimal::MAX), trade("EURUSD", 2, 9, Decimal::MAX)];
        let rows = hourly_breakdown(&trades);
        assert_eq!(rows[9].stats.profit, Decimal::MAX);
        assert_eq!(rows[9].stats.trade_count, 2);
    }

    #[test]
    fn test_symbol_rows_sorted_by_profit() {
        let trades = vec![
            trade("GBPUSD", 1, 8, dec!(-30)),
            trade("EURUSD", 1, 9, dec!(10)),
            trade("EURUSD", 2, 9, dec!(30)),
            trade("XAUUSD", 3, 9, dec!(5)),
        ];

        let rows = symbol_breakdown(&trades);
        let symbols: Vec<_> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EURUSD", "XAUUSD", "GBPUSD"]);

        // std([10, 30]) = 14.142..., avg = 20
        assert!((rows[0].risk_score - 200f64.sqrt() / 20.0).abs() < 1e-9);
        // single trade has no dispersion
        assert_eq!(rows[1].risk_score, 0.0);
    }
}
