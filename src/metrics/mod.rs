//! Trade performance analytics: metrics snapshot, balance replay, filters and breakdowns.

mod breakdown;
mod calculator;
mod drawdown;
mod filter;

pub use breakdown::{
    hourly_breakdown, monthly_breakdown, session_breakdown, symbol_breakdown, weekday_breakdown,
};
pub use calculator::compute_metrics;
pub use drawdown::{simulate, time_ordered};
pub use filter::{apply_filters, DateRange, ProfitRange, TradeFilters};
