use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractKind {
    Credit,
    Debit,
    Withdraw,
    Deposit,
}

impl ExtractKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractKind::Credit => "CREDIT",
            ExtractKind::Debit => "DEBIT",
            ExtractKind::Withdraw => "WITHDRAW",
            ExtractKind::Deposit => "DEPOSIT",
        }
    }

    /// Money coming into the account
    pub fn is_inflow(&self) -> bool {
        matches!(self, ExtractKind::Credit | ExtractKind::Deposit)
    }
}

impl fmt::Display for ExtractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(ExtractKind::Credit),
            "DEBIT" => Ok(ExtractKind::Debit),
            "WITHDRAW" => Ok(ExtractKind::Withdraw),
            "DEPOSIT" => Ok(ExtractKind::Deposit),
            other => Err(format!("unknown extract kind '{}'", other)),
        }
    }
}

/// Materialized running total for one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    pub fn open(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

/// Append-only ledger entry. Never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extract {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: ExtractKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Extract {
    pub fn new(user_id: Uuid, kind: ExtractKind, amount: Decimal, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind,
            description,
            created_at: Utc::now(),
        }
    }

    pub fn credit(user_id: Uuid, amount: Decimal, description: String) -> Self {
        Self::new(user_id, ExtractKind::Credit, amount, description)
    }

    pub fn withdrawal(user_id: Uuid, amount: Decimal, description: String) -> Self {
        Self::new(user_id, ExtractKind::Withdraw, amount, description)
    }
}
