#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;
use relay_catalog::{GeoPricingCache, PricingEngine};
use relay_core::location::LocationService;
use relay_core::{CoreError, CoreResult};
use relay_order::{DeliveryCodeAllocator, DeliveryDraft, DeliveryOrchestrator, WalletService};
use relay_shared::{Address, AddressParts, Company, Courier, GeoPoint, Principal, Role, RouteEstimate, VehicleType};
use relay_store::{InMemoryCache, InMemoryDeliveryStore};

/// Geocoder stand-in: every address maps to the same point, every route
/// has the configured length.
pub struct FixedLocator {
    pub resolves: AtomicUsize,
    pub distance_meters: u64,
}

impl FixedLocator {
    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationService for FixedLocator {
    async fn resolve(&self, address: &AddressParts) -> CoreResult<GeoPoint> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if address.street.trim().is_empty() {
            return Err(CoreError::invalid("address could not be located"));
        }
        Ok(GeoPoint::new(-34.88, -8.05))
    }

    async fn distance(&self, _from: GeoPoint, _to: GeoPoint) -> CoreResult<RouteEstimate> {
        Ok(RouteEstimate {
            distance_meters: self.distance_meters,
            duration_seconds: self.distance_meters / 5,
        })
    }
}

pub struct Actor<T> {
    pub principal: Principal,
    pub record: T,
}

pub struct World {
    pub store: Arc<InMemoryDeliveryStore>,
    pub cache: Arc<InMemoryCache>,
    pub locator: Arc<FixedLocator>,
    pub orchestrator: Arc<DeliveryOrchestrator>,
    pub company: Actor<Company>,
    pub courier_a: Actor<Courier>,
    pub courier_b: Actor<Courier>,
    pub admins: Vec<Uuid>,
}

pub fn bike() -> VehicleType {
    VehicleType {
        name: "bike".to_string(),
        base_fare: dec!(5.00),
        per_km_rate: dec!(1.20),
        rounding_scale: 2,
        max_weight_kg: dec!(10),
        max_height_cm: dec!(50),
        max_width_cm: dec!(50),
        max_length_cm: dec!(50),
    }
}

pub fn street(name: &str) -> AddressParts {
    AddressParts {
        street: name.to_string(),
        number: "100".to_string(),
        city: "Recife".to_string(),
        state: "PE".to_string(),
        zip_code: "50050-000".to_string(),
        complement: None,
    }
}

pub fn draft() -> DeliveryDraft {
    DeliveryDraft {
        vehicle_type: "bike".to_string(),
        use_company_address: false,
        address: Some(street("Avenida Boa Viagem")),
        client_address: street("Rua da Aurora"),
        height_cm: dec!(20),
        width_cm: dec!(20),
        length_cm: dec!(20),
        weight_kg: dec!(2.5),
        is_fragile: true,
        information: " ring the bell ".to_string(),
        email: "client@example.com".to_string(),
        phone: "+55 81 99999-0000".to_string(),
    }
}

pub fn is_delivery_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 7
        && bytes[..2].iter().all(|b| b.is_ascii_uppercase())
        && bytes[2] == b'-'
        && bytes[3..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub async fn world() -> World {
    world_with(2, 1).await
}

/// Seeded store with one company (with a registered address), two couriers
/// and the given number of active and inactive administrators.
pub async fn world_with(active_admins: usize, inactive_admins: usize) -> World {
    let store = Arc::new(InMemoryDeliveryStore::new());
    store.add_vehicle_type(bike()).await;

    let company_user = Uuid::new_v4();
    let hq = Address::new(street("Rua do Bom Jesus"), GeoPoint::new(-34.87, -8.06));
    let company = store.add_company(company_user, "Padaria Aurora", Some(hq)).await;

    let a_user = Uuid::new_v4();
    let courier_a = store.add_courier(a_user, "Joana").await;
    let b_user = Uuid::new_v4();
    let courier_b = store.add_courier(b_user, "Marcos").await;

    let mut admins = Vec::new();
    for _ in 0..active_admins {
        let id = Uuid::new_v4();
        store.add_admin(id, true).await;
        admins.push(id);
    }
    for _ in 0..inactive_admins {
        store.add_admin(Uuid::new_v4(), false).await;
    }

    let cache = Arc::new(InMemoryCache::new());
    let locator = Arc::new(FixedLocator {
        resolves: AtomicUsize::new(0),
        distance_meters: 3000,
    });

    let pricing = GeoPricingCache::new(cache.clone(), locator.clone(), store.clone(), PricingEngine::default());
    let codes = DeliveryCodeAllocator::new(store.clone());
    let orchestrator = DeliveryOrchestrator::new(store.clone(), store.clone(), locator.clone(), pricing, codes);

    World {
        store,
        cache,
        locator,
        orchestrator: Arc::new(orchestrator),
        company: Actor { principal: Principal::new(company_user, Role::Company), record: company },
        courier_a: Actor { principal: Principal::new(a_user, Role::Courier), record: courier_a },
        courier_b: Actor { principal: Principal::new(b_user, Role::Courier), record: courier_b },
        admins,
    }
}

impl World {
    /// Create a delivery from `draft()` and return its id and code
    pub async fn create_delivery(&self) -> (Uuid, String) {
        let created = self.orchestrator.create(&draft(), &self.company.principal).await.unwrap();
        let detail = self.orchestrator.find_by_code(&created.code, &self.company.principal).await.unwrap();
        (detail.delivery.id, created.code)
    }

    pub fn wallet(&self) -> WalletService {
        WalletService::new(self.store.clone(), self.store.clone())
    }

    pub async fn balance_of(&self, courier: &Actor<Courier>) -> Decimal {
        self.store.balance(courier.record.user_id).await.unwrap_or_default()
    }
}
