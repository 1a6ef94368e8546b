use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;
use relay_core::repository::UnitOfWork;
use relay_core::{CoreError, CoreResult};
use relay_shared::{Courier, Delivery, DeliveryStatus, Principal};

use crate::ledger::LedgerPoster;
use crate::status::{is_allowed, parse_status_token};

/// Decide what a courier's request does to a delivery.
///
/// Returns `None` when the delivery already has the requested status,
/// otherwise the updated delivery. A `PENDING` delivery may be acted on
/// by any courier, who becomes its owner; after that only the owner may
/// move it.
pub fn plan_transition(
    delivery: &Delivery,
    courier: &Courier,
    requested: DeliveryStatus,
    now: DateTime<Utc>,
) -> CoreResult<Option<Delivery>> {
    let current = delivery.status;

    if current != DeliveryStatus::Pending && delivery.courier_id != Some(courier.id) {
        return Err(CoreError::forbidden(format!(
            "delivery {} is not assigned to you",
            delivery.code
        )));
    }

    if requested == current {
        return Ok(None);
    }

    if current.is_terminal() {
        return Err(CoreError::forbidden(format!(
            "delivery {} is already {}",
            delivery.code,
            current.as_str().to_lowercase()
        )));
    }

    if !is_allowed(current, requested) {
        return Err(CoreError::forbidden(format!(
            "cannot move delivery {} from {} to {}",
            delivery.code, current, requested
        )));
    }

    let mut next = delivery.clone();
    next.status = requested;
    next.updated_at = now;
    if current == DeliveryStatus::Pending {
        next.courier_id = Some(courier.id);
    }
    if requested == DeliveryStatus::Completed {
        next.completed_at = Some(now);
    }

    Ok(Some(next))
}

/// Drives courier status updates and books the earning on completion
#[derive(Debug, Clone, Default)]
pub struct DeliveryStateMachine {
    ledger: LedgerPoster,
}

impl DeliveryStateMachine {
    pub fn new(ledger: LedgerPoster) -> Self {
        Self { ledger }
    }

    /// Apply `requested` to the delivery inside `uow`. The delivery row is
    /// locked first, so a concurrent claim sees the winner's write.
    pub async fn transition(
        &self,
        uow: &mut dyn UnitOfWork,
        delivery_id: Uuid,
        requested: &str,
        actor: &Principal,
    ) -> CoreResult<Delivery> {
        if !actor.is_courier() {
            return Err(CoreError::forbidden("only couriers can change a delivery status"));
        }
        let requested = parse_status_token(requested)?;

        let courier = uow
            .find_courier_by_user(actor.id)
            .await?
            .ok_or_else(|| CoreError::not_found("no courier profile for this account"))?;

        let delivery = uow
            .lock_delivery(delivery_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("delivery {} not found", delivery_id)))?;

        let Some(updated) = plan_transition(&delivery, &courier, requested, Utc::now())? else {
            debug!(delivery_code = %delivery.code, status = %delivery.status, "Status unchanged");
            return Ok(delivery);
        };

        uow.update_delivery(&updated).await?;
        if updated.status == DeliveryStatus::Completed {
            self.ledger.post_completion(uow, &updated, &courier).await?;
        }

        info!(
            delivery_code = %updated.code,
            courier_id = %courier.id,
            from = %delivery.status,
            to = %updated.status,
            "Delivery status changed"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_shared::pii::Masked;
    use relay_shared::{Address, Balance, Extract, Notification, PackageDetails, Role};
    use rust_decimal_macros::dec;

    fn courier() -> Courier {
        Courier { id: Uuid::new_v4(), user_id: Uuid::new_v4(), name: "Joana".to_string() }
    }

    fn delivery(status: DeliveryStatus, owner: Option<&Courier>) -> Delivery {
        let package = PackageDetails {
            height_cm: dec!(10),
            width_cm: dec!(10),
            length_cm: dec!(10),
            weight_kg: dec!(1),
            is_fragile: false,
            information: String::new(),
            email: Masked("a@b.c".to_string()),
            phone: Masked("81999990000".to_string()),
        };
        let mut d = Delivery::new(
            "RA-7K2Q".to_string(),
            dec!(8.60),
            "bike".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            package,
        );
        d.status = status;
        d.courier_id = owner.map(|c| c.id);
        if status == DeliveryStatus::Completed {
            d.completed_at = Some(Utc::now());
        }
        d
    }

    #[test]
    fn test_every_pair_from_owner() {
        let owner = courier();
        for from in DeliveryStatus::ALL {
            let current_owner = (from != DeliveryStatus::Pending).then_some(&owner);
            let d = delivery(from, current_owner);

            for to in DeliveryStatus::ALL {
                let result = plan_transition(&d, &owner, to, Utc::now());
                match result {
                    Ok(None) => assert_eq!(from, to),
                    Ok(Some(next)) => {
                        assert!(is_allowed(from, to), "{} -> {} should be rejected", from, to);
                        assert_eq!(next.status, to);
                        assert_eq!(next.courier_id, Some(owner.id));
                        assert!(next.is_consistent());
                    }
                    Err(CoreError::Forbidden(_)) => {
                        assert!(from != to && !is_allowed(from, to), "{} -> {} should be allowed", from, to);
                    }
                    Err(other) => panic!("unexpected error {:?} for {} -> {}", other, from, to),
                }
            }
        }
    }

    #[test]
    fn test_claim_assigns_courier() {
        let c = courier();
        let next = plan_transition(&delivery(DeliveryStatus::Pending, None), &c, DeliveryStatus::InProgress, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(next.courier_id, Some(c.id));
        assert!(next.completed_at.is_none());
    }

    #[test]
    fn test_completion_sets_timestamp() {
        let c = courier();
        let now = Utc::now();
        let next = plan_transition(&delivery(DeliveryStatus::InProgress, Some(&c)), &c, DeliveryStatus::Completed, now)
            .unwrap()
            .unwrap();
        assert_eq!(next.completed_at, Some(now));
    }

    #[test]
    fn test_non_owner_is_forbidden_even_for_noop() {
        let owner = courier();
        let intruder = courier();

        for from in [DeliveryStatus::InProgress, DeliveryStatus::Completed, DeliveryStatus::Canceled] {
            let d = delivery(from, Some(&owner));
            for to in DeliveryStatus::ALL {
                let err = plan_transition(&d, &intruder, to, Utc::now()).unwrap_err();
                assert!(matches!(err, CoreError::Forbidden(_)));
            }
        }
    }

    #[test]
    fn test_any_courier_may_cancel_pending() {
        let c = courier();
        let next = plan_transition(&delivery(DeliveryStatus::Pending, None), &c, DeliveryStatus::Canceled, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(next.status, DeliveryStatus::Canceled);
        assert_eq!(next.courier_id, Some(c.id));
    }

    #[test]
    fn test_terminal_delivery_cannot_move() {
        let owner = courier();
        for from in [DeliveryStatus::Completed, DeliveryStatus::Canceled] {
            let d = delivery(from, Some(&owner));
            let err = plan_transition(&d, &owner, DeliveryStatus::InProgress, Utc::now()).unwrap_err();
            assert!(matches!(err, CoreError::Forbidden(ref msg) if msg.contains("already")));
        }
    }

    /// What a unit of work sees after waiting on the row lock of a delivery
    /// another courier's unit claimed and committed
    struct ClaimedElsewhere {
        row: Delivery,
        acting: Courier,
        writes: usize,
    }

    #[async_trait]
    impl UnitOfWork for ClaimedElsewhere {
        async fn lock_delivery(&mut self, id: Uuid) -> CoreResult<Option<Delivery>> {
            Ok((id == self.row.id).then(|| self.row.clone()))
        }

        async fn insert_address(&mut self, _: &Address) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn insert_delivery(&mut self, _: &Delivery) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn update_delivery(&mut self, _: &Delivery) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn find_courier_by_user(&mut self, user_id: Uuid) -> CoreResult<Option<Courier>> {
            Ok((user_id == self.acting.user_id).then(|| self.acting.clone()))
        }

        async fn lock_balance(&mut self, _: Uuid) -> CoreResult<Option<Balance>> {
            Ok(None)
        }

        async fn update_balance(&mut self, _: &Balance) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn append_extract(&mut self, _: &Extract) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn active_admin_ids(&mut self) -> CoreResult<Vec<Uuid>> {
            Ok(Vec::new())
        }

        async fn insert_notifications(&mut self, _: &[Notification]) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn lock_notification(&mut self, _: Uuid, _: Uuid) -> CoreResult<Option<Notification>> {
            Ok(None)
        }

        async fn update_notification(&mut self, _: &Notification) -> CoreResult<()> {
            self.writes += 1;
            Ok(())
        }

        async fn commit(self: Box<Self>) -> CoreResult<()> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> CoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_claim_losing_the_row_lock_is_forbidden() {
        let winner = courier();
        let loser = courier();
        let actor = Principal::new(loser.user_id, Role::Courier);

        for token in ["in_transit", "delivered", "cancelled"] {
            let mut uow = ClaimedElsewhere {
                row: delivery(DeliveryStatus::InProgress, Some(&winner)),
                acting: loser.clone(),
                writes: 0,
            };
            let id = uow.row.id;

            let err = DeliveryStateMachine::default()
                .transition(&mut uow, id, token, &actor)
                .await
                .unwrap_err();

            assert!(matches!(err, CoreError::Forbidden(_)), "{} gave {:?}", token, err);
            assert_eq!(uow.writes, 0);
        }
    }
}
