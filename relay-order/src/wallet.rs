use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};
use uuid::Uuid;
use relay_core::repository::{DeliveryRepository, DeliveryScope, DeliveryTotals, LedgerRepository};
use relay_core::{CoreError, CoreResult};
use relay_shared::{Courier, DeliveryFilter, DeliveryStatus, Extract, ExtractKind, Principal};

use crate::models::{BalanceSummary, CourierReport, CourierStats, WalletTransaction, WithdrawReceipt, WithdrawRequest};
use crate::reports::{build_report, ReportRange};

const RECENT_TRANSACTIONS: u64 = 20;
const MONTHLY_STATS_MONTHS: u64 = 3;

/// Courier earnings: balance overview, withdrawals, delivery statistics
pub struct WalletService {
    ledger: Arc<dyn LedgerRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
}

impl WalletService {
    pub fn new(ledger: Arc<dyn LedgerRepository>, deliveries: Arc<dyn DeliveryRepository>) -> Self {
        Self { ledger, deliveries }
    }

    /// Readable by the courier and by administrators
    pub async fn balance_summary(&self, courier_user_id: Uuid, principal: &Principal) -> CoreResult<BalanceSummary> {
        let courier = self.readable_courier(courier_user_id, principal).await?;
        let current_balance = self.current_balance(&courier).await?;
        let total_earned = self
            .ledger
            .sum_extracts(courier.user_id, &[ExtractKind::Credit, ExtractKind::Deposit])
            .await?;
        let total_withdrawn = self
            .ledger
            .sum_extracts(courier.user_id, &[ExtractKind::Withdraw, ExtractKind::Debit])
            .await?;
        let transactions = self
            .ledger
            .recent_extracts(courier.user_id, RECENT_TRANSACTIONS)
            .await?
            .iter()
            .map(WalletTransaction::from)
            .collect();

        Ok(BalanceSummary {
            current_balance,
            total_earned,
            total_withdrawn,
            transactions,
        })
    }

    /// Debit the balance and record the withdrawal. Only the courier may withdraw.
    pub async fn withdraw(
        &self,
        courier_user_id: Uuid,
        request: &WithdrawRequest,
        principal: &Principal,
    ) -> CoreResult<WithdrawReceipt> {
        if request.amount < Decimal::new(1, 2) {
            return Err(CoreError::invalid("withdrawal amount must be at least 0.01"));
        }

        let courier = self.courier(courier_user_id).await?;
        if !principal.is_courier() || principal.id != courier.user_id {
            return Err(CoreError::forbidden("only the courier can withdraw from this balance"));
        }

        // Returning early drops the unit of work, which discards it.
        let mut uow = self.ledger.begin().await?;
        let Some(mut balance) = uow.lock_balance(courier.user_id).await? else {
            error!(courier_user_id = %courier.user_id, "Courier has no balance account");
            return Err(CoreError::Fatal(format!(
                "balance account missing for courier user {}",
                courier.user_id
            )));
        };

        if request.amount > balance.amount {
            return Err(CoreError::invalid("insufficient balance"));
        }

        balance.amount -= request.amount;
        balance.updated_at = chrono::Utc::now();

        let description = match request.pix_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => format!("Withdrawal to PIX key {}", key),
            _ => "Withdrawal".to_string(),
        };
        let extract = Extract::withdrawal(courier.user_id, request.amount, description);

        uow.update_balance(&balance).await?;
        uow.append_extract(&extract).await?;
        uow.commit().await?;

        info!(
            courier_user_id = %courier.user_id,
            amount = %request.amount,
            new_balance = %balance.amount,
            "Courier withdrawal recorded"
        );
        Ok(WithdrawReceipt {
            id: extract.id,
            amount: request.amount,
            new_balance: balance.amount,
            status: "completed".to_string(),
        })
    }

    /// Delivery counts by status, completed earnings and the last three
    /// active months. Readable by the courier and by administrators.
    pub async fn stats(&self, courier_user_id: Uuid, principal: &Principal) -> CoreResult<CourierStats> {
        let courier = self.readable_courier(courier_user_id, principal).await?;
        let scope = DeliveryScope::AssignedTo(courier.id);

        let all = self.totals(scope, None).await?;
        let completed = self.totals(scope, Some(DeliveryStatus::Completed)).await?;
        let pending = self.totals(scope, Some(DeliveryStatus::Pending)).await?;
        let in_progress = self.totals(scope, Some(DeliveryStatus::InProgress)).await?;
        let cancelled = self.totals(scope, Some(DeliveryStatus::Canceled)).await?;

        let monthly_stats = self
            .deliveries
            .monthly_delivery_stats(courier.id, MONTHLY_STATS_MONTHS)
            .await?;

        Ok(CourierStats {
            total_deliveries: all.count,
            completed_deliveries: completed.count,
            pending_deliveries: pending.count + in_progress.count,
            cancelled_deliveries: cancelled.count,
            total_earnings: completed.price_sum,
            current_balance: self.current_balance(&courier).await?,
            monthly_stats,
        })
    }

    /// Deliveries the courier was given between two days (UTC, inclusive),
    /// or during the current week, bucketed by weekday and time of day
    pub async fn reports(
        &self,
        courier_user_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        principal: &Principal,
    ) -> CoreResult<CourierReport> {
        let range = ReportRange::resolve(start_date, end_date, Utc::now().date_naive())?;
        let courier = self.readable_courier(courier_user_id, principal).await?;

        let filter = DeliveryFilter {
            created_from: Some(range.start),
            created_to: Some(range.end),
            ..DeliveryFilter::default()
        };
        let rows = self
            .deliveries
            .list_deliveries(DeliveryScope::AssignedTo(courier.id), &filter, None)
            .await?;

        debug!(courier_id = %courier.id, deliveries = rows.len(), start = %range.start, end = %range.end, "Building courier report");
        Ok(build_report(range, &rows))
    }

    async fn readable_courier(&self, user_id: Uuid, principal: &Principal) -> CoreResult<Courier> {
        let courier = self.courier(user_id).await?;
        if !principal.is_admin() && principal.id != courier.user_id {
            return Err(CoreError::forbidden("cannot view another courier's earnings"));
        }
        Ok(courier)
    }

    async fn totals(&self, scope: DeliveryScope, status: Option<DeliveryStatus>) -> CoreResult<DeliveryTotals> {
        let filter = status.map(DeliveryFilter::with_status).unwrap_or_default();
        self.deliveries.delivery_totals(scope, &filter).await
    }

    async fn current_balance(&self, courier: &Courier) -> CoreResult<Decimal> {
        Ok(self
            .ledger
            .find_balance(courier.user_id)
            .await?
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO))
    }

    async fn courier(&self, user_id: Uuid) -> CoreResult<Courier> {
        self.ledger
            .find_courier_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("courier {} not found", user_id)))
    }
}
