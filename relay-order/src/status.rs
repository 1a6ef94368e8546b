use relay_core::{CoreError, CoreResult};
use relay_shared::DeliveryStatus;

/// Allowed `(from, to)` pairs. Staying in the same state is handled
/// separately as a no-op.
const TRANSITIONS: [(DeliveryStatus, DeliveryStatus); 4] = [
    (DeliveryStatus::Pending, DeliveryStatus::InProgress),
    (DeliveryStatus::Pending, DeliveryStatus::Canceled),
    (DeliveryStatus::InProgress, DeliveryStatus::Completed),
    (DeliveryStatus::InProgress, DeliveryStatus::Canceled),
];

/// Map a free-text status token sent by the courier app to a status
pub fn parse_status_token(token: &str) -> CoreResult<DeliveryStatus> {
    match token.trim().to_lowercase().as_str() {
        "pending" => Ok(DeliveryStatus::Pending),
        "in_transit" | "in_progress" => Ok(DeliveryStatus::InProgress),
        "delivered" | "completed" => Ok(DeliveryStatus::Completed),
        "cancelled" | "canceled" => Ok(DeliveryStatus::Canceled),
        other => Err(CoreError::invalid(format!("invalid status '{}'", other))),
    }
}

/// Token the courier app expects back
pub fn status_token(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::InProgress => "in_transit",
        DeliveryStatus::Completed => "delivered",
        DeliveryStatus::Canceled => "cancelled",
    }
}

pub fn is_allowed(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    TRANSITIONS.contains(&(from, to))
}
