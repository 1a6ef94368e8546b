use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;
use relay_shared::{
    Address, Balance, Company, Courier, Delivery, DeliveryFilter, DeliveryStatus, DeliverySummary, Extract,
    ExtractKind, MonthlyDeliveryStats, Notification, VehicleType,
};

use crate::CoreResult;

/// One atomic, isolated scope of reads and writes.
///
/// `lock_*` reads take a row lock held until the unit ends, so two units
/// touching the same delivery or balance are serialized. Dropping a unit
/// without calling `commit` discards every write made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn lock_delivery(&mut self, id: Uuid) -> CoreResult<Option<Delivery>>;

    async fn insert_address(&mut self, address: &Address) -> CoreResult<()>;

    /// Fails with `CoreError::Conflict` when the delivery code is already taken
    async fn insert_delivery(&mut self, delivery: &Delivery) -> CoreResult<()>;

    async fn update_delivery(&mut self, delivery: &Delivery) -> CoreResult<()>;

    async fn find_courier_by_user(&mut self, user_id: Uuid) -> CoreResult<Option<Courier>>;

    async fn lock_balance(&mut self, user_id: Uuid) -> CoreResult<Option<Balance>>;

    async fn update_balance(&mut self, balance: &Balance) -> CoreResult<()>;

    async fn append_extract(&mut self, extract: &Extract) -> CoreResult<()>;

    /// Ids of administrators whose account is currently active
    async fn active_admin_ids(&mut self) -> CoreResult<Vec<Uuid>>;

    async fn insert_notifications(&mut self, notifications: &[Notification]) -> CoreResult<()>;

    /// Notification addressed to `recipient_id`, locked until the unit ends
    async fn lock_notification(&mut self, id: Uuid, recipient_id: Uuid) -> CoreResult<Option<Notification>>;

    async fn update_notification(&mut self, notification: &Notification) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;

    async fn rollback(self: Box<Self>) -> CoreResult<()>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn UnitOfWork>>;
}

/// Reference data for pricing
#[async_trait]
pub trait VehicleTypeRepository: Send + Sync {
    async fn find_vehicle_type(&self, name: &str) -> CoreResult<Option<VehicleType>>;
}

/// Existence checks backing the code allocator. The storage uniqueness
/// constraints stay authoritative; these only keep collisions rare.
#[async_trait]
pub trait CodeRegistry: Send + Sync {
    async fn delivery_code_exists(&self, code: &str) -> CoreResult<bool>;

    async fn license_plate_exists(&self, plate: &str) -> CoreResult<bool>;
}

/// Deliveries a listing may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryScope {
    All,
    /// Requested by this company
    Company(Uuid),
    /// Still `PENDING`, or taken by this courier
    OpenOrAssignedTo(Uuid),
    /// Taken by this courier
    AssignedTo(Uuid),
}

impl DeliveryScope {
    pub fn includes(&self, delivery: &Delivery) -> bool {
        match *self {
            DeliveryScope::All => true,
            DeliveryScope::Company(id) => delivery.company_id == id,
            DeliveryScope::OpenOrAssignedTo(id) => {
                delivery.status == DeliveryStatus::Pending || delivery.courier_id == Some(id)
            }
            DeliveryScope::AssignedTo(id) => delivery.courier_id == Some(id),
        }
    }
}

/// Rows to skip and the most to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// Aggregate over the deliveries matching a scope and filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryTotals {
    pub count: u64,
    pub price_sum: Decimal,
}

/// Company and courier profiles, looked up by the owning user account
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_company_by_user(&self, user_id: Uuid) -> CoreResult<Option<Company>>;

    async fn find_courier_by_user(&self, user_id: Uuid) -> CoreResult<Option<Courier>>;
}

#[async_trait]
pub trait DeliveryRepository: UnitOfWorkFactory + AccountRepository {
    async fn find_address(&self, id: Uuid) -> CoreResult<Option<Address>>;

    /// Delivery with this code, only if it belongs to `company_id`
    async fn find_delivery_by_code(&self, code: &str, company_id: Uuid) -> CoreResult<Option<Delivery>>;

    /// Newest first. Every row when `window` is `None`.
    async fn list_deliveries(
        &self,
        scope: DeliveryScope,
        filter: &DeliveryFilter,
        window: Option<PageWindow>,
    ) -> CoreResult<Vec<DeliverySummary>>;

    async fn delivery_totals(&self, scope: DeliveryScope, filter: &DeliveryFilter) -> CoreResult<DeliveryTotals>;

    /// The `months` most recent calendar months in which the courier was
    /// given a delivery, oldest first
    async fn monthly_delivery_stats(&self, courier_id: Uuid, months: u64) -> CoreResult<Vec<MonthlyDeliveryStats>>;
}

#[async_trait]
pub trait LedgerRepository: UnitOfWorkFactory + AccountRepository {
    async fn find_balance(&self, user_id: Uuid) -> CoreResult<Option<Balance>>;

    async fn sum_extracts(&self, user_id: Uuid, kinds: &[ExtractKind]) -> CoreResult<Decimal>;

    /// Newest first
    async fn recent_extracts(&self, user_id: Uuid, limit: u64) -> CoreResult<Vec<Extract>>;
}

#[async_trait]
pub trait NotificationRepository: UnitOfWorkFactory {
    /// Newest first
    async fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> CoreResult<Vec<Notification>>;

    async fn count_notifications(&self, recipient_id: Uuid) -> CoreResult<u64>;

    async fn count_unread(&self, recipient_id: Uuid) -> CoreResult<u64>;

    async fn billing_exists(&self, key: &str, user_id: Uuid) -> CoreResult<bool>;
}
