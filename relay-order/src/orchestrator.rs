use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;
use relay_catalog::{GeoPricingCache, PricingEngine, RouteOrigin, Simulation};
use relay_core::location::LocationService;
use relay_core::repository::{DeliveryRepository, DeliveryScope, UnitOfWork, VehicleTypeRepository};
use relay_core::{CoreError, CoreResult};
use relay_shared::{Address, Company, Delivery, DeliveryDetail, DeliveryFilter, Principal, Role};

use crate::codes::DeliveryCodeAllocator;
use crate::models::{CreatedDelivery, DeliveryDraft, DeliveryPage, StatusUpdate};
use crate::paging::PageRequest;
use crate::state_machine::DeliveryStateMachine;

/// Origin of a draft once the company's address has been looked up
enum DraftOrigin {
    Company(Address),
    Given,
}

/// Entry point for company and courier operations on deliveries
pub struct DeliveryOrchestrator {
    deliveries: Arc<dyn DeliveryRepository>,
    vehicles: Arc<dyn VehicleTypeRepository>,
    location: Arc<dyn LocationService>,
    pricing: GeoPricingCache,
    engine: PricingEngine,
    codes: DeliveryCodeAllocator,
    state_machine: DeliveryStateMachine,
}

impl DeliveryOrchestrator {
    pub fn new(
        deliveries: Arc<dyn DeliveryRepository>,
        vehicles: Arc<dyn VehicleTypeRepository>,
        location: Arc<dyn LocationService>,
        pricing: GeoPricingCache,
        codes: DeliveryCodeAllocator,
    ) -> Self {
        Self {
            deliveries,
            vehicles,
            location,
            pricing,
            engine: PricingEngine::default(),
            codes,
            state_machine: DeliveryStateMachine::default(),
        }
    }

    /// Distance, duration and price for a draft. Nothing is stored apart
    /// from the cached simulation.
    pub async fn simulate(&self, draft: &DeliveryDraft, principal: &Principal) -> CoreResult<Simulation> {
        let company = self.requesting_company(principal).await?;
        let (_, simulation) = self.quote(draft, &company).await?;
        Ok(simulation)
    }

    /// Price the draft and store it as a new `PENDING` delivery with a
    /// fresh code. A code taken between allocation and insert is retried
    /// with a new one.
    pub async fn create(&self, draft: &DeliveryDraft, principal: &Principal) -> CoreResult<CreatedDelivery> {
        let company = self.requesting_company(principal).await?;
        let (origin, simulation) = self.quote(draft, &company).await?;

        let origin = match origin {
            DraftOrigin::Company(address) => Address::new(address.parts, address.point),
            DraftOrigin::Given => {
                let parts = required_origin(draft)?.clone();
                let point = self.location.resolve(&parts).await?;
                Address::new(parts, point)
            }
        };
        let destination_point = self.location.resolve(&draft.client_address).await?;
        let destination = Address::new(draft.client_address.clone(), destination_point);

        for attempt in 1..=self.codes.max_attempts() {
            let code = self.codes.allocate(&draft.client_address.street).await?;
            let delivery = Delivery::new(
                code,
                simulation.price,
                draft.vehicle_type.trim().to_lowercase(),
                company.id,
                origin.id,
                destination.id,
                draft.package(),
            );

            let mut uow = self.deliveries.begin().await?;
            match store_delivery(uow.as_mut(), &origin, &destination, &delivery).await {
                Ok(()) => {
                    uow.commit().await?;
                    info!(
                        delivery_code = %delivery.code,
                        company_id = %company.id,
                        price = %delivery.price,
                        "Delivery created"
                    );
                    return Ok(CreatedDelivery { code: delivery.code });
                }
                Err(CoreError::Conflict(reason)) => {
                    warn!(code = %delivery.code, attempt, reason = %reason, "Delivery code taken at insert, retrying");
                    uow.rollback().await?;
                }
                Err(e) => {
                    if let Err(rollback_err) = uow.rollback().await {
                        error!(error = %rollback_err, "Rollback failed after create error");
                    }
                    return Err(e);
                }
            }
        }

        Err(CoreError::Conflict(format!(
            "could not store delivery with a unique code after {} attempts",
            self.codes.max_attempts()
        )))
    }

    /// Courier status change. Claim, progress, completion (with the
    /// ledger credit) and cancellation each commit atomically.
    pub async fn update_status(&self, delivery_id: Uuid, token: &str, principal: &Principal) -> CoreResult<StatusUpdate> {
        let mut uow = self.deliveries.begin().await?;

        match self.state_machine.transition(uow.as_mut(), delivery_id, token, principal).await {
            Ok(delivery) => {
                uow.commit().await?;
                Ok(StatusUpdate::from(&delivery))
            }
            Err(e) => {
                match e {
                    CoreError::Fatal(ref reason) => {
                        error!(delivery_id = %delivery_id, reason = %reason, "Status change aborted");
                    }
                    ref transient if transient.is_transient() => {
                        warn!(delivery_id = %delivery_id, error = %transient, "Status change interrupted, safe to retry");
                    }
                    _ => {}
                }
                if let Err(rollback_err) = uow.rollback().await {
                    error!(error = %rollback_err, "Rollback failed after status change error");
                }
                Err(e)
            }
        }
    }

    /// Delivery details for the company that requested it
    pub async fn find_by_code(&self, code: &str, principal: &Principal) -> CoreResult<DeliveryDetail> {
        let company = self.requesting_company(principal).await?;
        let code = code.trim().to_uppercase();

        let delivery = self
            .deliveries
            .find_delivery_by_code(&code, company.id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("delivery with code {} not found", code)))?;

        let origin = self.stored_address(delivery.origin_address_id).await?;
        let destination = self.stored_address(delivery.destination_address_id).await?;
        let company_address = match company.address_id {
            Some(id) => self.deliveries.find_address(id).await?.map(|a| a.parts.display_line()),
            None => None,
        };

        Ok(DeliveryDetail {
            delivery,
            company_name: company.name,
            company_phone: company.phone,
            company_address,
            origin,
            destination,
        })
    }

    /// One page of deliveries, newest first. Companies see their own
    /// deliveries, couriers the open ones plus those they took, and
    /// administrators every delivery.
    pub async fn list(
        &self,
        filter: &DeliveryFilter,
        page: u64,
        limit: u64,
        principal: &Principal,
    ) -> CoreResult<DeliveryPage> {
        let request = PageRequest::new(page, limit)?;
        let scope = self.listing_scope(principal).await?;

        let items = self
            .deliveries
            .list_deliveries(scope, filter, Some(request.window()))
            .await?;
        let total = self.deliveries.delivery_totals(scope, filter).await?.count;

        Ok(DeliveryPage {
            items,
            page: request.page,
            limit: request.limit,
            total,
            total_pages: request.total_pages(total),
        })
    }

    async fn listing_scope(&self, principal: &Principal) -> CoreResult<DeliveryScope> {
        match principal.role {
            Role::Admin => Ok(DeliveryScope::All),
            Role::Company => Ok(DeliveryScope::Company(self.requesting_company(principal).await?.id)),
            Role::Courier => {
                let courier = self
                    .deliveries
                    .find_courier_by_user(principal.id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("no courier profile for this account"))?;
                Ok(DeliveryScope::OpenOrAssignedTo(courier.id))
            }
        }
    }

    async fn requesting_company(&self, principal: &Principal) -> CoreResult<Company> {
        if !principal.is_company() {
            return Err(CoreError::forbidden("only companies can manage deliveries"));
        }
        self.deliveries
            .find_company_by_user(principal.id)
            .await?
            .ok_or_else(|| CoreError::not_found("company profile not found"))
    }

    async fn quote(&self, draft: &DeliveryDraft, company: &Company) -> CoreResult<(DraftOrigin, Simulation)> {
        let vehicle = self
            .vehicles
            .find_vehicle_type(&draft.vehicle_type)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("vehicle type '{}' not found", draft.vehicle_type)))?;
        self.engine.check_capacity(&vehicle, &draft.package())?;

        let (origin, route_origin) = if draft.use_company_address {
            let address_id = company
                .address_id
                .ok_or_else(|| CoreError::not_found("company has no registered address"))?;
            let address = self
                .deliveries
                .find_address(address_id)
                .await?
                .ok_or_else(|| CoreError::not_found("company address not found"))?;
            let point = address.point;
            (DraftOrigin::Company(address), RouteOrigin::Point(point))
        } else {
            (DraftOrigin::Given, RouteOrigin::Address(required_origin(draft)?.clone()))
        };

        let simulation = self
            .pricing
            .simulate(&draft.vehicle_type, &route_origin, &draft.client_address)
            .await?;
        Ok((origin, simulation))
    }

    async fn stored_address(&self, id: Uuid) -> CoreResult<Address> {
        match self.deliveries.find_address(id).await? {
            Some(address) => Ok(address),
            None => {
                error!(address_id = %id, "Delivery references a missing address");
                Err(CoreError::Fatal(format!("address {} missing", id)))
            }
        }
    }
}

fn required_origin(draft: &DeliveryDraft) -> CoreResult<&relay_shared::AddressParts> {
    draft
        .address
        .as_ref()
        .ok_or_else(|| CoreError::invalid("origin address is required unless use_company_address is set"))
}

async fn store_delivery(
    uow: &mut dyn UnitOfWork,
    origin: &Address,
    destination: &Address,
    delivery: &Delivery,
) -> CoreResult<()> {
    uow.insert_address(origin).await?;
    uow.insert_address(destination).await?;
    uow.insert_delivery(delivery).await
}
