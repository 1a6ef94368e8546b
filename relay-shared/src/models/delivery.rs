use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::models::address::Address;
use crate::pii::Masked;

/// Delivery status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Pending,
        DeliveryStatus::InProgress,
        DeliveryStatus::Completed,
        DeliveryStatus::Canceled,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::InProgress => "IN_PROGRESS",
            DeliveryStatus::Completed => "COMPLETED",
            DeliveryStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Canceled)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DeliveryStatus::Pending),
            "IN_PROGRESS" => Ok(DeliveryStatus::InProgress),
            "COMPLETED" => Ok(DeliveryStatus::Completed),
            "CANCELED" => Ok(DeliveryStatus::Canceled),
            other => Err(format!("unknown delivery status '{}'", other)),
        }
    }
}

/// What is being carried and who receives it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDetails {
    pub height_cm: Decimal,
    pub width_cm: Decimal,
    pub length_cm: Decimal,
    pub weight_kg: Decimal,
    pub is_fragile: bool,
    pub information: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// A delivery order, from creation until it is completed or canceled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    pub code: String,
    pub status: DeliveryStatus,
    pub price: Decimal,
    pub vehicle_type: String,
    pub company_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub origin_address_id: Uuid,
    pub destination_address_id: Uuid,
    pub package: PackageDetails,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(
        code: String,
        price: Decimal,
        vehicle_type: String,
        company_id: Uuid,
        origin_address_id: Uuid,
        destination_address_id: Uuid,
        package: PackageDetails,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            status: DeliveryStatus::Pending,
            price,
            vehicle_type,
            company_id,
            courier_id: None,
            origin_address_id,
            destination_address_id,
            package,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `completed_at` is set iff completed, and a courier is attached to
    /// every delivery that has left `PENDING`.
    pub fn is_consistent(&self) -> bool {
        let completion_ok = self.completed_at.is_some() == (self.status == DeliveryStatus::Completed);
        let courier_ok = self.status == DeliveryStatus::Pending || self.courier_id.is_some();
        completion_ok && courier_ok
    }
}

/// A company that requests deliveries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address_id: Option<Uuid>,
}

/// A courier account. Balances are keyed by `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Courier {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

/// Delivery with its addresses and requesting company, as shown to the company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub company_name: String,
    pub company_phone: Option<String>,
    pub company_address: Option<String>,
    pub origin: Address,
    pub destination: Address,
}

/// Delivery with its requesting company and both addresses, as listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySummary {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub company_name: String,
    pub origin: Address,
    pub destination: Address,
}

/// Optional criteria for listing deliveries. Every criterion that is set
/// must match. Text criteria match case-insensitively anywhere in the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub code: Option<String>,
    pub vehicle_type: Option<String>,
    pub is_fragile: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub completed_from: Option<DateTime<Utc>>,
    pub completed_to: Option<DateTime<Utc>>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub origin_city: Option<String>,
    pub client_city: Option<String>,
}

impl DeliveryFilter {
    pub fn with_status(status: DeliveryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Text criteria with surrounding whitespace removed; blank ones are dropped
    pub fn normalized(&self) -> Self {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            code: clean(&self.code),
            vehicle_type: clean(&self.vehicle_type).map(|v| v.to_lowercase()),
            origin_city: clean(&self.origin_city),
            client_city: clean(&self.client_city),
            ..self.clone()
        }
    }

    pub fn matches(&self, delivery: &Delivery, origin: &Address, destination: &Address) -> bool {
        let completed_in_range = match delivery.completed_at {
            Some(at) => {
                self.completed_from.map_or(true, |from| at >= from) && self.completed_to.map_or(true, |to| at <= to)
            }
            None => self.completed_from.is_none() && self.completed_to.is_none(),
        };

        self.status.map_or(true, |s| s == delivery.status)
            && contains_ignore_case(&delivery.code, self.code.as_deref())
            && self.vehicle_type.as_deref().map_or(true, |v| v.eq_ignore_ascii_case(&delivery.vehicle_type))
            && self.is_fragile.map_or(true, |f| f == delivery.package.is_fragile)
            && self.min_price.map_or(true, |min| delivery.price >= min)
            && self.max_price.map_or(true, |max| delivery.price <= max)
            && completed_in_range
            && self.created_from.map_or(true, |from| delivery.created_at >= from)
            && self.created_to.map_or(true, |to| delivery.created_at <= to)
            && contains_ignore_case(&origin.parts.city, self.origin_city.as_deref())
            && contains_ignore_case(&destination.parts.city, self.client_city.as_deref())
    }
}

fn contains_ignore_case(value: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |n| value.to_lowercase().contains(&n.to_lowercase()))
}

/// Deliveries a courier was given in one calendar month
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyDeliveryStats {
    /// `YYYY-MM`
    pub month: String,
    pub deliveries: u64,
    /// Sum of the prices of the month's completed deliveries
    pub earnings: Decimal,
}
