//! Trading account the journal's trades belong to.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A broker account tracked by the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingAccount {
    pub id: Uuid,

    /// Display name
    pub account_name: String,

    /// Broker-side account number
    #[serde(default)]
    pub account_number: Option<String>,

    #[serde(default)]
    pub broker: Option<String>,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Balance before the first journaled trade
    #[serde(default)]
    pub starting_balance: Decimal,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

impl TradingAccount {
    /// Create a new active account.
    pub fn new(account_name: impl Into<String>, starting_balance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_name: account_name.into(),
            account_number: None,
            broker: None,
            currency: default_currency(),
            starting_balance,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
