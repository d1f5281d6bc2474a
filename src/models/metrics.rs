//! Performance metrics snapshot: win rate, drawdown, profit factor, etc.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value reported for ratios whose denominator is zero while the numerator is positive.
pub const UNBOUNDED_RATIO: f64 = 999.0;

/// Read-only performance statistics derived from a set of trades and a starting balance.
///
/// Serializes as a flat map of camelCase metric names to numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    // === Counts ===
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,

    /// Win rate in percent (0 to 100)
    pub win_rate: f64,

    // === Totals ===
    /// Net of commission and swap, over time-stamped trades
    #[serde(with = "rust_decimal::serde::float")]
    pub total_profit: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub total_commission: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub total_swap: Decimal,

    /// Sum of positive profits
    #[serde(with = "rust_decimal::serde::float")]
    pub gross_profit: Decimal,

    /// Sum of negative profits (negative or zero)
    #[serde(with = "rust_decimal::serde::float")]
    pub gross_loss: Decimal,

    /// Starting balance plus total profit
    #[serde(with = "rust_decimal::serde::float")]
    pub total_balance: Decimal,

    // === Per-trade ===
    pub profit_factor: f64,

    #[serde(with = "rust_decimal::serde::float")]
    pub average_profit: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub average_win: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub average_loss: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub largest_win: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub largest_loss: Decimal,

    /// Mean |close - open| / |open - stop loss|
    #[serde(rename = "averageRRR")]
    pub average_rrr: f64,

    /// Mean direction-aware R multiple
    pub average_r_multiple: f64,

    // === Drawdown ===
    #[serde(with = "rust_decimal::serde::float")]
    pub max_drawdown: Decimal,

    pub max_drawdown_percent: f64,

    #[serde(with = "rust_decimal::serde::float")]
    pub current_drawdown: Decimal,

    pub current_drawdown_percent: f64,

    pub recovery_factor: f64,

    // === Activity ===
    pub trades_per_day: f64,
    pub trades_per_week: f64,
    pub trades_per_month: f64,
    pub max_consecutive_wins: u32,
    pub max_consecutive_losses: u32,
}

impl MetricsSnapshot {
    /// Create zeroed metrics for an account holding `starting_balance`.
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_profit: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            total_swap: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            total_balance: starting_balance,
            profit_factor: 0.0,
            average_profit: Decimal::ZERO,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            largest_win: Decimal::ZERO,
            largest_loss: Decimal::ZERO,
            average_rrr: 0.0,
            average_r_multiple: 0.0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_percent: 0.0,
            current_drawdown: Decimal::ZERO,
            current_drawdown_percent: 0.0,
            recovery_factor: 0.0,
            trades_per_day: 0.0,
            trades_per_week: 0.0,
            trades_per_month: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }

    /// Flatten into metric name -> value, in the same names used for serialization.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        let money = |d: Decimal| d.to_f64().unwrap_or(0.0);

        BTreeMap::from([
            ("totalTrades", f64::from(self.total_trades)),
            ("winningTrades", f64::from(self.winning_trades)),
            ("losingTrades", f64::from(self.losing_trades)),
            ("winRate", self.win_rate),
            ("totalProfit", money(self.total_profit)),
            ("totalCommission", money(self.total_commission)),
            ("totalSwap", money(self.total_swap)),
            ("grossProfit", money(self.gross_profit)),
            ("grossLoss", money(self.gross_loss)),
            ("totalBalance", money(self.total_balance)),
            ("profitFactor", self.profit_factor),
            ("averageProfit", money(self.average_profit)),
            ("averageWin", money(self.average_win)),
            ("averageLoss", money(self.average_loss)),
            ("largestWin", money(self.largest_win)),
            ("largestLoss", money(self.largest_loss)),
            ("averageRRR", self.average_rrr),
            ("averageRMultiple", self.average_r_multiple),
            ("maxDrawdown", money(self.max_drawdown)),
            ("maxDrawdownPercent", self.max_drawdown_percent),
            ("currentDrawdown", money(self.current_drawdown)),
            ("currentDrawdownPercent", self.current_drawdown_percent),
            ("recoveryFactor", self.recovery_factor),
            ("tradesPerDay", self.trades_per_day),
            ("tradesPerWeek", self.trades_per_week),
            ("tradesPerMonth", self.trades_per_month),
            ("maxConsecutiveWins", f64::from(self.max_consecutive_wins)),
            ("maxConsecutiveLosses", f64::from(self.max_consecutive_losses)),
        ])
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Performance ---")?;
        writeln!(f, "Total Trades:     {}", self.total_trades)?;
        writeln!(f, "Won / Lost:       {} / {}", self.winning_trades, self.losing_trades)?;
        writeln!(f, "Win Rate:         {:.1}%", self.win_rate)?;
        writeln!(f, "Total Profit:     ${:.2}", self.total_profit)?;
        writeln!(f, "Commission:       ${:.2}", self.total_commission)?;
        writeln!(f, "Swap:             ${:.2}", self.total_swap)?;
        writeln!(f, "Balance:          ${:.2}", self.total_balance)?;

        writeln!(f, "\n--- Per Trade ---")?;
        writeln!(f, "Profit Factor:    {:.2}", self.profit_factor)?;
        writeln!(f, "Average Profit:   ${:.2}", self.average_profit)?;
        writeln!(f, "Average Win:      ${:.2}", self.average_win)?;
        writeln!(f, "Average Loss:     ${:.2}", self.average_loss)?;
        writeln!(f, "Largest Win:      ${:.2}", self.largest_win)?;
        writeln!(f, "Largest Loss:     ${:.2}", self.largest_loss)?;
        writeln!(f, "Average RRR:      {:.2}", self.average_rrr)?;
        writeln!(f, "Average R:        {:.2}", self.average_r_multiple)?;

        writeln!(f, "\n--- Risk ---")?;
        writeln!(f, "Max Drawdown:     ${:.2}", self.max_drawdown)?;
        writeln!(f, "Max Drawdown %:   {:.2}%", self.max_drawdown_percent)?;
        writeln!(f, "Current Drawdown: ${:.2}", self.current_drawdown)?;
        writeln!(f, "Current DD %:     {:.2}%", self.current_drawdown_percent)?;
        writeln!(f, "Recovery Factor:  {:.2}", self.recovery_factor)?;

        writeln!(f, "\n--- Activity ---")?;
        writeln!(f, "Trades/Day:       {:.2}", self.trades_per_day)?;
        writeln!(f, "Trades/Week:      {:.2}", self.trades_per_week)?;
        writeln!(f, "Trades/Month:     {:.2}", self.trades_per_month)?;
        writeln!(f, "Win Streak:       {}", self.max_consecutive_wins)?;
        writeln!(f, "Loss Streak:      {}", self.max_consecutive_losses)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_serializes_as_metric_map() {
        let snapshot = MetricsSnapshot::new(dec!(2500));
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["totalBalance"], serde_json::json!(2500.0));
        assert_eq!(value["averageRRR"], serde_json::json!(0.0));
        assert!(value.get("total_balance").is_none());

        let map = snapshot.to_map();
        assert_eq!(map.len(), value.as_object().unwrap().len());
        assert_eq!(map["totalBalance"], 2500.0);
    }

    #[test]
    fn test_display_report() {
        let mut snapshot = MetricsSnapshot::new(dec!(1000));
        snapshot.total_trades = 3;
        snapshot.winning_trades = 2;
        snapshot.losing_trades = 1;
        snapshot.max_drawdown = dec!(50);
        snapshot.max_drawdown_percent = 50.0 / 11.0;

        let report = snapshot.to_string();
        assert!(report.contains("Won / Lost:       2 / 1"));
        assert!(report.contains("Max Drawdown:     $50.00"));
        assert!(report.contains("Max Drawdown %:   4.55%"));
    }
}
