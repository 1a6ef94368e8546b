use tracing::{error, info};
use relay_core::repository::UnitOfWork;
use relay_core::{CoreError, CoreResult};
use relay_shared::{Courier, Delivery, Extract, Notification};

const ADMIN_NOTICE_TITLE: &str = "Delivery completed";

/// Books the courier's earning when a delivery completes.
///
/// Runs inside the same unit of work as the status change, so the credit,
/// its extract and the admin notices land together or not at all. It is
/// only ever invoked on the transition into `COMPLETED`, which can happen
/// once per delivery.
#[derive(Debug, Clone, Default)]
pub struct LedgerPoster;

impl LedgerPoster {
    pub fn new() -> Self {
        Self
    }

    pub async fn post_completion(
        &self,
        uow: &mut dyn UnitOfWork,
        delivery: &Delivery,
        courier: &Courier,
    ) -> CoreResult<Extract> {
        let mut balance = match uow.lock_balance(courier.user_id).await? {
            Some(balance) => balance,
            None => {
                error!(
                    courier_user_id = %courier.user_id,
                    delivery_code = %delivery.code,
                    "Courier has no balance account"
                );
                return Err(CoreError::Fatal(format!(
                    "balance account missing for courier user {}",
                    courier.user_id
                )));
            }
        };

        balance.amount = balance.amount.checked_add(delivery.price).ok_or_else(|| {
            error!(courier_user_id = %courier.user_id, "Balance overflow");
            CoreError::Fatal("balance overflow".to_string())
        })?;
        balance.updated_at = chrono::Utc::now();
        uow.update_balance(&balance).await?;

        let extract = Extract::credit(
            courier.user_id,
            delivery.price,
            format!("Delivery {} completed", delivery.code),
        );
        uow.append_extract(&extract).await?;

        let message = format!(
            "{} completed delivery {} for {:.2}",
            display_name(courier),
            delivery.code,
            delivery.price
        );
        let notices: Vec<Notification> = uow
            .active_admin_ids()
            .await?
            .into_iter()
            .map(|admin_id| {
                Notification::informational(
                    admin_id,
                    courier.user_id,
                    ADMIN_NOTICE_TITLE.to_string(),
                    message.clone(),
                )
            })
            .collect();
        uow.insert_notifications(&notices).await?;

        info!(
            delivery_code = %delivery.code,
            courier_user_id = %courier.user_id,
            amount = %delivery.price,
            new_balance = %balance.amount,
            admins_notified = notices.len(),
            "Credited courier for completed delivery"
        );
        Ok(extract)
    }
}

fn display_name(courier: &Courier) -> &str {
    let name = courier.name.trim();
    if name.is_empty() {
        "Courier"
    } else {
        name
    }
}
