//! Trade model representing a single broker trade in a trading journal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
        }
    }

    /// +1 for longs, -1 for shorts.
    pub fn direction(&self) -> Decimal {
        match self {
            TradeType::Buy => Decimal::ONE,
            TradeType::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            other => anyhow::bail!("trade type must be \"buy\" or \"sell\", got {:?}", other),
        }
    }
}

/// Individual trade record synced from a broker terminal.
///
/// Monetary fields that are missing or `null` in the source data read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Journal-side identifier
    pub id: Uuid,

    /// Owning trading account
    pub trading_account_id: Uuid,

    /// Broker ticket number, used to detect re-imports
    #[serde(default)]
    pub ticket: Option<i64>,

    /// Instrument symbol (e.g. "EURUSD")
    pub symbol: String,

    /// Trade direction
    #[serde(rename = "type")]
    pub trade_type: TradeType,

    /// Lot size
    #[serde(default, deserialize_with = "zero_if_missing")]
    pub volume: Decimal,

    #[serde(default, deserialize_with = "zero_if_missing")]
    pub open_price: Decimal,

    #[serde(default)]
    pub close_price: Option<Decimal>,

    #[serde(default)]
    pub stop_loss: Option<Decimal>,

    #[serde(default)]
    pub take_profit: Option<Decimal>,

    /// Gross result of the trade (signed)
    #[serde(default, deserialize_with = "zero_if_missing")]
    pub profit: Decimal,

    #[serde(default, deserialize_with = "zero_if_missing")]
    pub commission: Decimal,

    #[serde(default, deserialize_with = "zero_if_missing")]
    pub swap: Decimal,

    #[serde(default)]
    pub open_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub comment: Option<String>,
}

fn zero_if_missing<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
}

/// Treats zero as "not set"; broker terminals report an unset stop loss as 0.
fn non_zero(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}

impl Trade {
    /// Create a trade with all optional fields unset.
    pub fn new(trading_account_id: Uuid, symbol: impl Into<String>, trade_type: TradeType) -> Self {
        Self {
            id: Uuid::new_v4(),
            trading_account_id,
            ticket: None,
            symbol: symbol.into(),
            trade_type,
            volume: Decimal::ZERO,
            open_price: Decimal::ZERO,
            close_price: None,
            stop_loss: None,
            take_profit: None,
            profit: Decimal::ZERO,
            commission: Decimal::ZERO,
            swap: Decimal::ZERO,
            open_time: None,
            close_time: None,
            comment: None,
        }
    }

    /// Profit after commission and swap.
    pub fn net_profit(&self) -> Decimal {
        self.profit
            .saturating_add(self.commission)
            .saturating_add(self.swap)
    }

    /// Timestamp used to order trades: close time, falling back to open time.
    pub fn sort_time(&self) -> Option<DateTime<Utc>> {
        self.close_time.or(self.open_time)
    }

    /// Timestamp used to bucket and filter trades: open time, falling back to close time.
    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.open_time.or(self.close_time)
    }

    pub fn is_timestamped(&self) -> bool {
        self.open_time.is_some() || self.close_time.is_some()
    }

    /// Distance between entry and stop, if both are known and differ.
    pub fn risk_distance(&self) -> Option<Decimal> {
        let open = non_zero(Some(self.open_price))?;
        let stop = non_zero(self.stop_loss)?;
        let risk = open.checked_sub(stop)?.abs();
        (!risk.is_zero()).then_some(risk)
    }

    /// Realized reward distance over risked distance, ignoring direction.
    pub fn reward_to_risk(&self) -> Option<Decimal> {
        let risk = self.risk_distance()?;
        let close = non_zero(self.close_price)?;
        close.checked_sub(self.open_price)?.abs().checked_div(risk)
    }

    /// Realized reward in units of initial risk, signed by trade direction.
    ///
    /// A sell closed above its entry yields a negative multiple.
    pub fn r_multiple(&self) -> Option<Decimal> {
        let risk = self.risk_distance()?;
        let close = non_zero(self.close_price)?;
        (close.checked_sub(self.open_price)? * self.trade_type.direction()).checked_div(risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn priced(trade_type: TradeType, open: Decimal, close: Decimal, stop: Decimal) -> Trade {
        let mut trade = Trade::new(Uuid::new_v4(), "EURUSD", trade_type);
        trade.open_price = open;
        trade.close_price = Some(close);
        trade.stop_loss = Some(stop);
        trade
    }

    #[test]
    fn test_reward_to_risk() {
        let trade = priced(TradeType::Buy, dec!(100), dec!(120), dec!(90));
        assert_eq!(trade.reward_to_risk(), Some(dec!(2)));
        assert_eq!(trade.r_multiple(), Some(dec!(2)));
    }

    #[test]
    fn test_r_multiple_is_directional_for_sells() {
        // Short from 100 with stop at 110, closed at 120: a full 2R loss
        let trade = priced(TradeType::Sell, dec!(100), dec!(120), dec!(110));
        assert_eq!(trade.reward_to_risk(), Some(dec!(2)));
        assert_eq!(trade.r_multiple(), Some(dec!(-2)));
    }

    #[test]
    fn test_zero_stop_loss_is_unset() {
        let trade = priced(TradeType::Buy, dec!(100), dec!(120), Decimal::ZERO);
        assert_eq!(trade.risk_distance(), None);
        assert_eq!(trade.reward_to_risk(), None);

        let flat = priced(TradeType::Buy, dec!(100), dec!(120), dec!(100));
        assert_eq!(flat.reward_to_risk(), None);
    }

    #[test]
    fn test_missing_numbers_default_to_zero() {
        let json = r#"{
            "id": "7f1c9a52-7d4c-4a8e-9a43-2b1f0c3e5d11",
            "trading_account_id": "0b7e2a40-3c55-4d4e-8f1a-6c2d9e8b7a10",
            "symbol": "XAUUSD",
            "type": "sell",
            "profit": null,
            "open_time": "2024-03-01T09:30:00Z"
        }"#;

        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.trade_type, TradeType::Sell);
        assert_eq!(trade.profit, Decimal::ZERO);
        assert_eq!(trade.commission, Decimal::ZERO);
        assert_eq!(trade.volume, Decimal::ZERO);
        assert!(trade.close_price.is_none());
        assert!(trade.is_timestamped());
    }

    #[test]
    fn test_trade_type_parsing() {
        assert_eq!(" BUY ".parse::<TradeType>().unwrap(), TradeType::Buy);
        assert_eq!("Sell".parse::<TradeType>().unwrap(), TradeType::Sell);
        assert!("hold".parse::<TradeType>().is_err());
    }
}
