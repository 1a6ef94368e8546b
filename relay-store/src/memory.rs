//! Process-local store and cache for tests and local runs.
//!
//! A unit of work holds the store-wide lock from `begin` until it is
//! committed or dropped and writes into a staged copy of the state, so
//! units are fully serialized and an uncommitted one leaves no trace.
//! Do not call the store's read methods while holding a unit of work on
//! the same task: they wait for the same lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use uuid::Uuid;
use relay_core::cache::CacheStore;
use relay_core::repository::{
    AccountRepository, CodeRegistry, DeliveryRepository, DeliveryScope, DeliveryTotals, LedgerRepository,
    NotificationRepository, PageWindow, UnitOfWork, UnitOfWorkFactory, VehicleTypeRepository,
};
use relay_core::{CoreError, CoreResult};
use relay_shared::{
    Address, Balance, Company, Courier, Delivery, DeliveryFilter, DeliveryStatus, DeliverySummary, Extract,
    ExtractKind, MonthlyDeliveryStats, Notification, VehicleType,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    vehicle_types: HashMap<String, VehicleType>,
    companies: HashMap<Uuid, Company>,
    couriers: HashMap<Uuid, Courier>,
    addresses: HashMap<Uuid, Address>,
    deliveries: HashMap<Uuid, Delivery>,
    /// Keyed by user id
    balances: HashMap<Uuid, Balance>,
    extracts: Vec<Extract>,
    /// Admin user id -> account active
    admins: HashMap<Uuid, bool>,
    notifications: Vec<Notification>,
    plates: HashSet<String>,
    billings: HashSet<(String, Uuid)>,
}

impl MemoryState {
    fn courier_by_user(&self, user_id: Uuid) -> Option<Courier> {
        self.couriers.values().find(|c| c.user_id == user_id).cloned()
    }

    /// Matching deliveries joined with their company and addresses, newest first
    fn summaries(&self, scope: DeliveryScope, filter: &DeliveryFilter) -> CoreResult<Vec<DeliverySummary>> {
        let filter = filter.normalized();
        let mut rows = Vec::new();

        for delivery in self.deliveries.values().filter(|d| scope.includes(d)) {
            let (Some(company), Some(origin), Some(destination)) = (
                self.companies.get(&delivery.company_id),
                self.addresses.get(&delivery.origin_address_id),
                self.addresses.get(&delivery.destination_address_id),
            ) else {
                return Err(CoreError::Fatal(format!("delivery {} has dangling references", delivery.id)));
            };
            if filter.matches(delivery, origin, destination) {
                rows.push(DeliverySummary {
                    delivery: delivery.clone(),
                    company_name: company.name.clone(),
                    origin: origin.clone(),
                    destination: destination.clone(),
                });
            }
        }

        rows.sort_by(|a, b| {
            b.delivery
                .created_at
                .cmp(&a.delivery.created_at)
                .then(a.delivery.id.cmp(&b.delivery.id))
        });
        Ok(rows)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDeliveryStore {
    state: Arc<AsyncMutex<MemoryState>>,
}

impl InMemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub async fn add_vehicle_type(&self, vehicle: VehicleType) {
        let key = vehicle.name.trim().to_lowercase();
        self.state.lock().await.vehicle_types.insert(key, vehicle);
    }

    /// Company owned by `user_id`, optionally with a registered address
    pub async fn add_company(&self, user_id: Uuid, name: &str, address: Option<Address>) -> Company {
        let mut state = self.state.lock().await;
        let company = Company {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            phone: Some("+55 81 3000-0000".to_string()),
            address_id: address.as_ref().map(|a| a.id),
        };
        if let Some(address) = address {
            state.addresses.insert(address.id, address);
        }
        state.companies.insert(company.id, company.clone());
        company
    }

    /// Courier with an empty balance account
    pub async fn add_courier(&self, user_id: Uuid, name: &str) -> Courier {
        let mut state = self.state.lock().await;
        let courier = Courier {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
        };
        state.couriers.insert(courier.id, courier.clone());
        state.balances.insert(user_id, Balance::open(user_id));
        courier
    }

    pub async fn add_admin(&self, user_id: Uuid, active: bool) {
        self.state.lock().await.admins.insert(user_id, active);
    }

    pub async fn add_delivery(&self, delivery: Delivery) {
        self.state.lock().await.deliveries.insert(delivery.id, delivery);
    }

    pub async fn add_address(&self, address: Address) {
        self.state.lock().await.addresses.insert(address.id, address);
    }

    pub async fn add_plate(&self, plate: &str) {
        self.state.lock().await.plates.insert(plate.to_string());
    }

    pub async fn add_billing(&self, key: &str, user_id: Uuid) {
        self.state.lock().await.billings.insert((key.to_string(), user_id));
    }

    pub async fn add_notification(&self, notification: Notification) {
        self.state.lock().await.notifications.push(notification);
    }

    pub async fn set_balance(&self, user_id: Uuid, amount: Decimal) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(user_id).or_insert_with(|| Balance::open(user_id));
        balance.amount = amount;
    }

    pub async fn remove_balance(&self, user_id: Uuid) {
        self.state.lock().await.balances.remove(&user_id);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub async fn delivery(&self, id: Uuid) -> Option<Delivery> {
        self.state.lock().await.deliveries.get(&id).cloned()
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.state.lock().await.deliveries.values().cloned().collect()
    }

    pub async fn balance(&self, user_id: Uuid) -> Option<Decimal> {
        self.state.lock().await.balances.get(&user_id).map(|b| b.amount)
    }

    pub async fn extracts(&self, user_id: Uuid) -> Vec<Extract> {
        self.state
            .lock()
            .await
            .extracts
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn notifications_for(&self, recipient_id: Uuid) -> Vec<Notification> {
        self.state
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_delivery(&mut self, id: Uuid) -> CoreResult<Option<Delivery>> {
        Ok(self.staged.deliveries.get(&id).cloned())
    }

    async fn insert_address(&mut self, address: &Address) -> CoreResult<()> {
        self.staged.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> CoreResult<()> {
        if self.staged.deliveries.values().any(|d| d.code == delivery.code) {
            return Err(CoreError::Conflict(format!("delivery code {} already exists", delivery.code)));
        }
        self.staged.deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> CoreResult<()> {
        match self.staged.deliveries.get_mut(&delivery.id) {
            Some(stored) => {
                *stored = delivery.clone();
                Ok(())
            }
            None => Err(CoreError::not_found(format!("delivery {} not found", delivery.id))),
        }
    }

    async fn find_courier_by_user(&mut self, user_id: Uuid) -> CoreResult<Option<Courier>> {
        Ok(self.staged.courier_by_user(user_id))
    }

    async fn lock_balance(&mut self, user_id: Uuid) -> CoreResult<Option<Balance>> {
        Ok(self.staged.balances.get(&user_id).cloned())
    }

    async fn update_balance(&mut self, balance: &Balance) -> CoreResult<()> {
        self.staged.balances.insert(balance.user_id, balance.clone());
        Ok(())
    }

    async fn append_extract(&mut self, extract: &Extract) -> CoreResult<()> {
        self.staged.extracts.push(extract.clone());
        Ok(())
    }

    async fn active_admin_ids(&mut self) -> CoreResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .staged
            .admins
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_notifications(&mut self, notifications: &[Notification]) -> CoreResult<()> {
        self.staged.notifications.extend_from_slice(notifications);
        Ok(())
    }

    async fn lock_notification(&mut self, id: Uuid, recipient_id: Uuid) -> CoreResult<Option<Notification>> {
        Ok(self
            .staged
            .notifications
            .iter()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
            .cloned())
    }

    async fn update_notification(&mut self, notification: &Notification) -> CoreResult<()> {
        match self.staged.notifications.iter_mut().find(|n| n.id == notification.id) {
            Some(stored) => {
                *stored = notification.clone();
                Ok(())
            }
            None => Err(CoreError::not_found(format!("notification {} not found", notification.id))),
        }
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryDeliveryStore {
    async fn begin(&self) -> CoreResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }
}

#[async_trait]
impl VehicleTypeRepository for InMemoryDeliveryStore {
    async fn find_vehicle_type(&self, name: &str) -> CoreResult<Option<VehicleType>> {
        let key = name.trim().to_lowercase();
        Ok(self.state.lock().await.vehicle_types.get(&key).cloned())
    }
}

#[async_trait]
impl CodeRegistry for InMemoryDeliveryStore {
    async fn delivery_code_exists(&self, code: &str) -> CoreResult<bool> {
        Ok(self.state.lock().await.deliveries.values().any(|d| d.code == code))
    }

    async fn license_plate_exists(&self, plate: &str) -> CoreResult<bool> {
        Ok(self.state.lock().await.plates.contains(plate))
    }
}

#[async_trait]
impl AccountRepository for InMemoryDeliveryStore {
    async fn find_company_by_user(&self, user_id: Uuid) -> CoreResult<Option<Company>> {
        let state = self.state.lock().await;
        Ok(state.companies.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn find_courier_by_user(&self, user_id: Uuid) -> CoreResult<Option<Courier>> {
        Ok(self.state.lock().await.courier_by_user(user_id))
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryDeliveryStore {
    async fn find_address(&self, id: Uuid) -> CoreResult<Option<Address>> {
        Ok(self.state.lock().await.addresses.get(&id).cloned())
    }

    async fn find_delivery_by_code(&self, code: &str, company_id: Uuid) -> CoreResult<Option<Delivery>> {
        let state = self.state.lock().await;
        Ok(state
            .deliveries
            .values()
            .find(|d| d.code == code && d.company_id == company_id)
            .cloned())
    }

    async fn list_deliveries(
        &self,
        scope: DeliveryScope,
        filter: &DeliveryFilter,
        window: Option<PageWindow>,
    ) -> CoreResult<Vec<DeliverySummary>> {
        let rows = self.state.lock().await.summaries(scope, filter)?;
        Ok(match window {
            Some(w) => rows.into_iter().skip(w.offset as usize).take(w.limit as usize).collect(),
            None => rows,
        })
    }

    async fn delivery_totals(&self, scope: DeliveryScope, filter: &DeliveryFilter) -> CoreResult<DeliveryTotals> {
        let rows = self.state.lock().await.summaries(scope, filter)?;
        Ok(DeliveryTotals {
            count: rows.len() as u64,
            price_sum: rows.iter().map(|r| r.delivery.price).sum(),
        })
    }

    async fn monthly_delivery_stats(&self, courier_id: Uuid, months: u64) -> CoreResult<Vec<MonthlyDeliveryStats>> {
        let state = self.state.lock().await;
        let mut by_month: BTreeMap<String, MonthlyDeliveryStats> = BTreeMap::new();

        for delivery in state.deliveries.values().filter(|d| d.courier_id == Some(courier_id)) {
            let month = delivery.created_at.format("%Y-%m").to_string();
            let entry = by_month.entry(month.clone()).or_insert_with(|| MonthlyDeliveryStats {
                month,
                deliveries: 0,
                earnings: Decimal::ZERO,
            });
            entry.deliveries += 1;
            if delivery.status == DeliveryStatus::Completed {
                entry.earnings += delivery.price;
            }
        }

        let skip = by_month.len().saturating_sub(months as usize);
        Ok(by_month.into_values().skip(skip).collect())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryDeliveryStore {
    async fn find_balance(&self, user_id: Uuid) -> CoreResult<Option<Balance>> {
        Ok(self.state.lock().await.balances.get(&user_id).cloned())
    }

    async fn sum_extracts(&self, user_id: Uuid, kinds: &[ExtractKind]) -> CoreResult<Decimal> {
        let state = self.state.lock().await;
        Ok(state
            .extracts
            .iter()
            .filter(|e| e.user_id == user_id && kinds.contains(&e.kind))
            .map(|e| e.amount)
            .sum())
    }

    async fn recent_extracts(&self, user_id: Uuid, limit: u64) -> CoreResult<Vec<Extract>> {
        let state = self.state.lock().await;
        Ok(state
            .extracts
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryDeliveryStore {
    async fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> CoreResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_notifications(&self, recipient_id: Uuid) -> CoreResult<u64> {
        let state = self.state.lock().await;
        Ok(state.notifications.iter().filter(|n| n.recipient_id == recipient_id).count() as u64)
    }

    async fn count_unread(&self, recipient_id: Uuid) -> CoreResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read())
            .count() as u64)
    }

    async fn billing_exists(&self, key: &str, user_id: Uuid) -> CoreResult<bool> {
        Ok(self.state.lock().await.billings.contains(&(key.to_string(), user_id)))
    }
}

/// TTL cache on the tokio clock, so paused-time tests can expire entries
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::Unavailable("cache lock poisoned".to_string()))?;

        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .map_err(|_| CoreError::Unavailable("cache lock poisoned".to_string()))?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}
