use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use relay_core::repository::{NotificationRepository, UnitOfWork};
use relay_core::{CoreError, CoreResult};
use relay_shared::{ActionStatus, Notification, NotificationKind, Principal};

use crate::models::{NotificationDraft, NotificationPage, PaymentSlipRequest};
use crate::paging::PageRequest;

const MAX_SLIP_MESSAGE_LEN: usize = 500;
const MAX_BILLING_KEY_LEN: usize = 100;
const SLIP_TITLE: &str = "Payment slip requested";
const SLIP_DEFAULT_MESSAGE: &str = "A company is requesting a payment slip.";

/// In-app notifications: inbox, read state, admin decisions
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Newest first. `page` starts at 1; `limit` is clamped to 1..=100.
    pub async fn list(&self, principal: &Principal, page: u64, limit: u64) -> CoreResult<NotificationPage> {
        let request = PageRequest::new(page, limit)?;
        let window = request.window();

        let items = self
            .repo
            .list_notifications(principal.id, window.offset, window.limit)
            .await?;
        let total = self.repo.count_notifications(principal.id).await?;

        Ok(NotificationPage {
            items,
            page: request.page,
            limit: request.limit,
            total,
            total_pages: request.total_pages(total),
        })
    }

    pub async fn unread_count(&self, principal: &Principal) -> CoreResult<u64> {
        self.repo.count_unread(principal.id).await
    }

    pub async fn mark_read(&self, id: Uuid, principal: &Principal) -> CoreResult<Notification> {
        let mut uow = self.repo.begin().await?;
        let mut notification = owned(uow.as_mut(), id, principal).await?;
        if notification.read_at.is_none() {
            notification.mark_read();
            uow.update_notification(&notification).await?;
            uow.commit().await?;
        }
        Ok(notification)
    }

    pub async fn approve(&self, id: Uuid, principal: &Principal) -> CoreResult<Notification> {
        self.resolve(id, principal, ActionStatus::Approved).await
    }

    pub async fn reject(&self, id: Uuid, principal: &Principal) -> CoreResult<Notification> {
        self.resolve(id, principal, ActionStatus::Rejected).await
    }

    /// Send a notification. Only administrators may address someone else.
    pub async fn create(&self, draft: &NotificationDraft, principal: &Principal) -> CoreResult<Notification> {
        let recipient_id = draft.user_id.unwrap_or(principal.id);
        if recipient_id != principal.id && !principal.is_admin() {
            return Err(CoreError::forbidden("only administrators can notify other users"));
        }

        let title = draft.title.trim();
        let message = draft.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(CoreError::invalid("title and message are required"));
        }

        let mut notification = Notification::new(
            recipient_id,
            Some(principal.id),
            draft.kind.unwrap_or(NotificationKind::Info),
            title.to_string(),
            message.to_string(),
            draft.requires_action.unwrap_or(false),
        );
        notification.metadata = draft.metadata.clone();
        notification.link = draft.link.clone();

        let mut uow = self.repo.begin().await?;
        uow.insert_notifications(std::slice::from_ref(&notification)).await?;
        uow.commit().await?;

        Ok(notification)
    }

    /// Ask every active administrator for a payment slip. Returns how many
    /// administrators were notified.
    pub async fn request_payment_slip(&self, request: &PaymentSlipRequest, principal: &Principal) -> CoreResult<usize> {
        if !principal.is_company() {
            return Err(CoreError::forbidden("only companies can request payment slips"));
        }

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(SLIP_DEFAULT_MESSAGE);
        if message.chars().count() > MAX_SLIP_MESSAGE_LEN {
            return Err(CoreError::invalid(format!(
                "message must be at most {} characters",
                MAX_SLIP_MESSAGE_LEN
            )));
        }

        let billing_key = request
            .billing_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if let Some(key) = billing_key {
            if key.chars().count() > MAX_BILLING_KEY_LEN {
                return Err(CoreError::invalid(format!(
                    "billing key must be at most {} characters",
                    MAX_BILLING_KEY_LEN
                )));
            }
            if !self.repo.billing_exists(key, principal.id).await? {
                return Err(CoreError::not_found(format!("billing {} not found", key)));
            }
        }

        let mut uow = self.repo.begin().await?;
        let admins = uow.active_admin_ids().await?;
        if admins.is_empty() {
            return Err(CoreError::not_found("no active administrator to notify"));
        }

        let notices: Vec<Notification> = admins
            .into_iter()
            .map(|admin_id| {
                let mut n = Notification::new(
                    admin_id,
                    Some(principal.id),
                    NotificationKind::PaymentSlipRequest,
                    SLIP_TITLE.to_string(),
                    message.to_string(),
                    true,
                );
                n.reference_key = billing_key.map(str::to_string);
                n
            })
            .collect();
        uow.insert_notifications(&notices).await?;
        uow.commit().await?;

        info!(company_user_id = %principal.id, admins = notices.len(), "Payment slip requested");
        Ok(notices.len())
    }

    /// The notification row stays locked from the pending check to the
    /// write, so of two concurrent decisions only the first is recorded.
    async fn resolve(&self, id: Uuid, principal: &Principal, outcome: ActionStatus) -> CoreResult<Notification> {
        // Returning early drops the unit of work, which discards it.
        let mut uow = self.repo.begin().await?;
        let mut notification = owned(uow.as_mut(), id, principal).await?;
        if !notification.requires_action {
            return Err(CoreError::invalid("notification does not require an action"));
        }
        if notification.action_status != ActionStatus::Pending {
            return Err(CoreError::invalid(format!(
                "notification already {}",
                notification.action_status.as_str().to_lowercase()
            )));
        }

        notification.resolve(outcome);
        uow.update_notification(&notification).await?;
        uow.commit().await?;

        info!(notification_id = %id, outcome = %outcome.as_str(), "Notification resolved");
        Ok(notification)
    }
}

/// Lock a notification addressed to the principal
async fn owned(uow: &mut dyn UnitOfWork, id: Uuid, principal: &Principal) -> CoreResult<Notification> {
    uow.lock_notification(id, principal.id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("notification {} not found", id)))
}
