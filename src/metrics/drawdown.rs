//! Running-balance simulation shared by every drawdown and recovery metric.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Trade;

/// Trades with a timestamp, stably sorted by close time (falling back to open time).
///
/// Trades carrying neither timestamp are dropped.
pub fn time_ordered(trades: &[Trade]) -> Vec<&Trade> {
    let mut ordered: Vec<&Trade> = trades.iter().filter(|t| t.is_timestamped()).collect();
    ordered.sort_by_key(|t| t.sort_time());
    ordered
}

/// One step of the balance curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub time: DateTime<Utc>,
    pub balance: Decimal,
    pub peak: Decimal,
    pub drawdown: Decimal,
}

/// Outcome of replaying trades against a starting balance.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DrawdownSummary {
    pub max_drawdown: Decimal,
    /// Max drawdown relative to the peak it was measured from, in percent
    pub max_drawdown_pct: f64,
    pub current_drawdown: Decimal,
    pub current_drawdown_pct: f64,
    pub peak_balance: Decimal,
    pub final_balance: Decimal,
    pub curve: Vec<BalancePoint>,
}

/// Replay `ordered` trades, applying each trade's profit to a running balance.
pub fn simulate(ordered: &[&Trade], starting_balance: Decimal) -> DrawdownSummary {
    let mut balance = starting_balance;
    let mut peak = starting_balance;
    let mut summary = DrawdownSummary {
        peak_balance: peak,
        final_balance: balance,
        ..Default::default()
    };

    for trade in ordered {
        let Some(time) = trade.sort_time() else {
            continue;
        };

        balance = balance.saturating_add(trade.profit);
        if balance > peak {
            peak = balance;
        }

        let drawdown = peak.saturating_sub(balance);
        if drawdown > summary.max_drawdown {
            summary.max_drawdown = drawdown;
            summary.max_drawdown_pct = percent_of_peak(drawdown, peak);
        }

        summary.curve.push(BalancePoint {
            time,
            balance,
            peak,
            drawdown,
        });
    }

    summary.current_drawdown = peak.saturating_sub(balance);
    summary.current_drawdown_pct = percent_of_peak(summary.current_drawdown, peak);
    summary.peak_balance = peak;
    summary.final_balance = balance;
    summary
}

/// `drawdown / peak * 100`, or 0 when the peak is not positive.
fn percent_of_peak(drawdown: Decimal, peak: Decimal) -> f64 {
    if peak <= Decimal::ZERO {
        return 0.0;
    }
    drawdown
        .checked_div(peak)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeType;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn closed_at(minutes: i64, profit: Decimal) -> Trade {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let mut trade = Trade::new(Uuid::nil(), "EURUSD", TradeType::Buy);
        trade.profit = profit;
        trade.open_time = Some(base);
        trade.close_time = Some(base + Duration::minutes(minutes));
        trade
    }

    #[test]
    fn test_peak_and_drawdown_sequence() {
        let trades = vec![
            closed_at(10, dec!(100)), // 1100, peak 1100
            closed_at(20, dec!(-50)), // 1050, peak 1100, DD 50
            closed_at(30, dec!(30)),  // 1080, peak 1100, DD 20
        ];

        let ordered = time_ordered(&trades);
        let summary = simulate(&ordered, dec!(1000));

        let peaks: Vec<_> = summary.curve.iter().map(|p| p.peak).collect();
        assert_eq!(peaks, vec![dec!(1100), dec!(1100), dec!(1100)]);
        assert_eq!(summary.max_drawdown, dec!(50));
        assert_eq!(summary.current_drawdown, dec!(20));
        assert_eq!(summary.final_balance, dec!(1080));
        assert!((summary.max_drawdown_pct - 50.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_ordering_uses_close_then_open() {
        let late = closed_at(60, dec!(-40));
        let early = closed_at(5, dec!(40));

        let mut open_only = Trade::new(Uuid::nil(), "GBPUSD", TradeType::Sell);
        open_only.open_time = Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap());

        let untimed = Trade::new(Uuid::nil(), "USDJPY", TradeType::Buy);

        let trades = vec![late.clone(), untimed, open_only.clone(), early.clone()];
        let ordered = time_ordered(&trades);

        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].id, early.id);
        assert_eq!(ordered[1].id, open_only.id);
        assert_eq!(ordered[2].id, late.id);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let first = closed_at(15, dec!(1));
        let second = closed_at(15, dec!(2));
        let trades = vec![first.clone(), second.clone()];

        let ordered = time_ordered(&trades);
        assert_eq!(ordered[0].id, first.id);
        assert_eq!(ordered[1].id, second.id);
    }

    #[test]
    fn test_zero_starting_balance_has_no_percent() {
        let trades = vec![closed_at(10, dec!(-25))];
        let summary = simulate(&time_ordered(&trades), Decimal::ZERO);

        assert_eq!(summary.max_drawdown, dec!(25));
        assert_eq!(summary.max_drawdown_pct, 0.0);
        assert_eq!(summary.current_drawdown_pct, 0.0);
    }

    #[test]
    fn test_extreme_balances_saturate() {
        let trades = vec![
            closed_at(10, Decimal::MAX),
            closed_at(20, Decimal::MAX),
            closed_at(30, Decimal::MIN),
        ];
        let summary = simulate(&time_ordered(&trades), dec!(10));

        assert_eq!(summary.peak_balance, Decimal::MAX);
        assert_eq!(summary.max_drawdown, Decimal::MAX);
        assert_eq!(summary.max_drawdown_pct, 100.0);

        // drawdown far larger than a tiny peak cannot be expressed as a percentage
        let crash = vec![closed_at(10, -(Decimal::MAX / dec!(50)))];
        let summary = simulate(&time_ordered(&crash), Decimal::ONE);
        assert!(summary.max_drawdown > Decimal::ZERO);
        assert_eq!(summary.max_drawdown_pct, 0.0);
        assert_eq!(summary.current_drawdown_pct, 0.0);
    }

    #[test]
    fn test_empty_replay() {
        let summary = simulate(&[], dec!(500));
        assert_eq!(summary.max_drawdown, Decimal::ZERO);
        assert_eq!(summary.current_drawdown, Decimal::ZERO);
        assert_eq!(summary.final_balance, dec!(500));
        assert!(summary.curve.is_empty());
    }
}
