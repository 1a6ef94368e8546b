use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Info,
    Warning,
    PaymentSlipRequest,
}

/// Read state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Read,
}

/// Outcome of a notification that asks the recipient for a decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
}

macro_rules! storage_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

storage_names!(NotificationKind {
    Info => "INFO",
    Warning => "WARNING",
    PaymentSlipRequest => "PAYMENT_SLIP_REQUEST",
});

storage_names!(NotificationStatus {
    Pending => "PENDING",
    Read => "READ",
});

storage_names!(ActionStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    pub requires_action: bool,
    pub action_status: ActionStatus,
    pub reference_key: Option<String>,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub action_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Unread notification. When no action is required it is auto-approved.
    pub fn new(
        recipient_id: Uuid,
        sender_id: Option<Uuid>,
        kind: NotificationKind,
        title: String,
        message: String,
        requires_action: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            sender_id,
            kind,
            status: NotificationStatus::Pending,
            title,
            message,
            requires_action,
            action_status: if requires_action {
                ActionStatus::Pending
            } else {
                ActionStatus::Approved
            },
            reference_key: None,
            link: None,
            metadata: None,
            read_at: None,
            action_at: None,
            created_at: Utc::now(),
        }
    }

    /// Already-read, no-action notice (system events such as a completed delivery)
    pub fn informational(recipient_id: Uuid, sender_id: Uuid, title: String, message: String) -> Self {
        let mut notification = Self::new(
            recipient_id,
            Some(sender_id),
            NotificationKind::Info,
            title,
            message,
            false,
        );
        notification.status = NotificationStatus::Read;
        notification
    }

    pub fn is_read(&self) -> bool {
        self.status == NotificationStatus::Read
    }

    pub fn mark_read(&mut self) {
        if self.read_at.is_none() {
            self.read_at = Some(Utc::now());
        }
        self.status = NotificationStatus::Read;
    }

    /// Record the recipient's decision; reading it is implied
    pub fn resolve(&mut self, outcome: ActionStatus) {
        self.action_status = outcome;
        self.action_at = Some(Utc::now());
        self.mark_read();
    }
}
