//! Calculator for trade performance metrics: win rate, drawdown, profit factor, etc.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::metrics::drawdown::{self, DrawdownSummary};
use crate::models::{MetricsSnapshot, Trade, UNBOUNDED_RATIO};

/// Calculator for computing a metrics snapshot from a trade set.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate every metric for `trades` against `starting_balance`.
    ///
    /// Total on its input: empty sets, zero denominators and missing fields
    /// all produce zeros rather than errors, NaN or infinity.
    pub fn calculate(trades: &[Trade], starting_balance: Decimal) -> MetricsSnapshot {
        let mut metrics = MetricsSnapshot::new(starting_balance);

        if trades.is_empty() {
            return metrics;
        }

        Self::calculate_totals(&mut metrics, trades, starting_balance);
        Self::calculate_trade_stats(&mut metrics, trades);
        Self::calculate_risk_reward(&mut metrics, trades);

        let ordered = drawdown::time_ordered(trades);
        let replay = drawdown::simulate(&ordered, starting_balance);
        Self::apply_drawdown(&mut metrics, &replay);
        Self::calculate_activity(&mut metrics, &ordered);

        metrics
    }

    /// Counts and monetary sums.
    fn calculate_totals(metrics: &mut MetricsSnapshot, trades: &[Trade], starting_balance: Decimal) {
        metrics.total_trades = trades.len() as u32;
        metrics.winning_trades = trades.iter().filter(|t| t.profit > Decimal::ZERO).count() as u32;
        metrics.losing_trades = trades.iter().filter(|t| t.profit < Decimal::ZERO).count() as u32;

        metrics.total_profit =
            saturating_sum(trades.iter().filter(|t| t.is_timestamped()).map(Trade::net_profit));
        metrics.total_commission = saturating_sum(trades.iter().map(|t| t.commission));
        metrics.total_swap = saturating_sum(trades.iter().map(|t| t.swap));
        metrics.total_balance = starting_balance.saturating_add(metrics.total_profit);
    }

    /// Win rate, profit factor and per-trade averages and extremes.
    fn calculate_trade_stats(metrics: &mut MetricsSnapshot, trades: &[Trade]) {
        let total = Decimal::from(metrics.total_trades);

        metrics.win_rate = ratio(Decimal::from(metrics.winning_trades), total) * 100.0;

        metrics.gross_profit =
            saturating_sum(trades.iter().map(|t| t.profit).filter(|p| *p > Decimal::ZERO));
        metrics.gross_loss =
            saturating_sum(trades.iter().map(|t| t.profit).filter(|p| *p < Decimal::ZERO));
        metrics.profit_factor = guarded_ratio(metrics.gross_profit, metrics.gross_loss.abs());

        let profit_sum = saturating_sum(trades.iter().map(|t| t.profit));
        metrics.average_profit = mean(profit_sum, metrics.total_trades);
        metrics.average_win = mean(metrics.gross_profit, metrics.winning_trades);
        metrics.average_loss = mean(metrics.gross_loss, metrics.losing_trades);

        metrics.largest_win = trades.iter().map(|t| t.profit).max().unwrap_or_default();
        metrics.largest_loss = trades.iter().map(|t| t.profit).min().unwrap_or_default();
    }

    /// Average reward-to-risk and R multiple over trades with a usable stop loss.
    fn calculate_risk_reward(metrics: &mut MetricsSnapshot, trades: &[Trade]) {
        let rrr: Vec<Decimal> = trades.iter().filter_map(Trade::reward_to_risk).collect();
        let r_multiples: Vec<Decimal> = trades.iter().filter_map(Trade::r_multiple).collect();

        metrics.average_rrr = decimal_mean(&rrr);
        metrics.average_r_multiple = decimal_mean(&r_multiples);
    }

    /// Copy drawdown figures from the balance replay and derive the recovery factor.
    fn apply_drawdown(metrics: &mut MetricsSnapshot, replay: &DrawdownSummary) {
        metrics.max_drawdown = replay.max_drawdown;
        metrics.max_drawdown_percent = replay.max_drawdown_pct;
        metrics.current_drawdown = replay.current_drawdown;
        metrics.current_drawdown_percent = replay.current_drawdown_pct;
        metrics.recovery_factor = guarded_ratio(metrics.total_profit, replay.max_drawdown);
    }

    /// Trade frequency and win/loss streaks over the time-ordered trades.
    fn calculate_activity(metrics: &mut MetricsSnapshot, ordered: &[&Trade]) {
        let (Some(first), Some(last)) = (
            ordered.first().and_then(|t| t.sort_time()),
            ordered.last().and_then(|t| t.sort_time()),
        ) else {
            return;
        };

        let span = last - first;
        let days = span.num_days().max(1) as f64;
        let weeks = span.num_weeks().max(1) as f64;
        let months = (span.num_days() / 30).max(1) as f64;

        let count = f64::from(metrics.total_trades);
        metrics.trades_per_day = count / days;
        metrics.trades_per_week = count / weeks;
        metrics.trades_per_month = count / months;

        let mut wins = 0u32;
        let mut losses = 0u32;
        for trade in ordered {
            if trade.profit > Decimal::ZERO {
                wins += 1;
                losses = 0;
            } else if trade.profit < Decimal::ZERO {
                losses += 1;
                wins = 0;
            } else {
                wins = 0;
                losses = 0;
            }
            metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(wins);
            metrics.max_consecutive_losses = metrics.max_consecutive_losses.max(losses);
        }
    }
}

/// Compute metrics for `trades` starting from `starting_balance` (absent means zero).
pub fn compute_metrics(trades: &[Trade], starting_balance: Option<Decimal>) -> MetricsSnapshot {
    MetricsCalculator::calculate(trades, starting_balance.unwrap_or_default())
}

/// Sum that clamps at `Decimal::MAX` / `Decimal::MIN` instead of overflowing.
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// `numerator / denominator` as f64, or 0 when the denominator is zero.
fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    numerator
        .checked_div(denominator)
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0)
}

/// Like [`ratio`], but a zero denominator with a positive numerator reports [`UNBOUNDED_RATIO`].
fn guarded_ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return if numerator > Decimal::ZERO { UNBOUNDED_RATIO } else { 0.0 };
    }
    ratio(numerator, denominator)
}

fn mean(sum: Decimal, count: u32) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    sum.checked_div(Decimal::from(count)).unwrap_or_default()
}

fn decimal_mean(values: &[Decimal]) -> f64 {
    let sum = saturating_sum(values.iter().copied());
    ratio(sum, Decimal::from(values.len() as u64))
}
