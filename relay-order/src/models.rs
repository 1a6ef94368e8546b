use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use relay_shared::pii::Masked;
use relay_shared::{
    AddressParts, Delivery, DeliverySummary, Extract, MonthlyDeliveryStats, Notification, NotificationKind,
    PackageDetails,
};

use crate::status::status_token;

/// Order draft submitted by a company, used both to simulate and to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryDraft {
    pub vehicle_type: String,
    /// Start from the company's registered address instead of `address`
    #[serde(default)]
    pub use_company_address: bool,
    /// Origin, required unless `use_company_address` is set
    #[serde(default)]
    pub address: Option<AddressParts>,
    /// Destination
    pub client_address: AddressParts,
    pub height_cm: Decimal,
    pub width_cm: Decimal,
    pub length_cm: Decimal,
    pub weight_kg: Decimal,
    #[serde(default)]
    pub is_fragile: bool,
    #[serde(default)]
    pub information: String,
    pub email: String,
    pub phone: String,
}

impl DeliveryDraft {
    pub fn package(&self) -> PackageDetails {
        PackageDetails {
            height_cm: self.height_cm,
            width_cm: self.width_cm,
            length_cm: self.length_cm,
            weight_kg: self.weight_kg,
            is_fragile: self.is_fragile,
            information: self.information.trim().to_string(),
            email: Masked(self.email.trim().to_string()),
            phone: Masked(self.phone.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedDelivery {
    pub code: String,
}

/// Result of a status change, with the outbound status token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub id: Uuid,
    pub code: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<&Delivery> for StatusUpdate {
    fn from(delivery: &Delivery) -> Self {
        Self {
            id: delivery.id,
            code: delivery.code.clone(),
            status: status_token(delivery.status).to_string(),
            delivered_at: delivery.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPage {
    pub items: Vec<DeliverySummary>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub id: Uuid,
    /// `earning` or `withdrawal`
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Extract> for WalletTransaction {
    fn from(extract: &Extract) -> Self {
        Self {
            id: extract.id,
            kind: if extract.kind.is_inflow() { "earning" } else { "withdrawal" }.to_string(),
            amount: extract.amount,
            description: extract.description.clone(),
            created_at: extract.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceSummary {
    pub current_balance: Decimal,
    pub total_earned: Decimal,
    pub total_withdrawn: Decimal,
    pub transactions: Vec<WalletTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub pix_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WithdrawReceipt {
    pub id: Uuid,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub status: String,
}

// ============================================================================
// Courier statistics and reports
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierStats {
    pub total_deliveries: u64,
    pub completed_deliveries: u64,
    /// Still pending or in transit
    pub pending_deliveries: u64,
    pub cancelled_deliveries: u64,
    /// Sum of the prices of completed deliveries
    pub total_earnings: Decimal,
    pub current_balance: Decimal,
    pub monthly_stats: Vec<MonthlyDeliveryStats>,
}

/// Deliveries given to the courier on one day of the week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayStats {
    pub day_of_week: String,
    /// Counts per four-hour slot of the creation time, starting at 00:00
    pub hourly_data: [u64; 6],
    pub total_deliveries: u64,
    pub completed_deliveries: u64,
    pub pending_deliveries: u64,
    pub cancelled_deliveries: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub total_deliveries: u64,
    pub completed_deliveries: u64,
    pub pending_deliveries: u64,
    pub cancelled_deliveries: u64,
    pub total_earnings: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDelivery {
    pub id: Uuid,
    pub code: String,
    /// Outbound status token
    pub status: String,
    pub day: String,
    /// Requesting company
    pub customer_name: String,
    /// Destination, single line
    pub address: String,
    pub value: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sunday first
    pub weekly_stats: Vec<DayStats>,
    pub summary: ReportSummary,
    /// Newest first
    pub deliveries: Vec<ReportDelivery>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub requires_action: Option<bool>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub link: Option<String>,
    /// Recipient; defaults to the sender
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSlipRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub billing_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}
