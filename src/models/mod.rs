//! Data models for accounts, trades, and metrics.

mod account;
mod metrics;
mod trade;

pub use account::TradingAccount;
pub use metrics::{MetricsSnapshot, UNBOUNDED_RATIO};
pub use trade::{Trade, TradeType};
