use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;
use relay_core::repository::{
    AccountRepository, CodeRegistry, DeliveryRepository, DeliveryScope, DeliveryTotals, LedgerRepository,
    NotificationRepository, PageWindow, UnitOfWork, UnitOfWorkFactory, VehicleTypeRepository,
};
use relay_core::{CoreError, CoreResult};
use relay_shared::pii::Masked;
use relay_shared::{
    Address, AddressParts, Balance, Company, Courier, Delivery, DeliveryFilter, DeliverySummary, Extract,
    ExtractKind, GeoPoint, MonthlyDeliveryStats, Notification, PackageDetails, VehicleType,
};

use crate::error::{db, StoreError};

const DELIVERY_COLUMNS: &str = "id, code, status, price, vehicle_type, company_id, courier_id, \
    origin_address_id, destination_address_id, height_cm, width_cm, length_cm, weight_kg, \
    is_fragile, information, email, phone, completed_at, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "d.id, d.code, d.status, d.price, d.vehicle_type, d.company_id, d.courier_id, \
    d.origin_address_id, d.destination_address_id, d.height_cm, d.width_cm, d.length_cm, d.weight_kg, \
    d.is_fragile, d.information, d.email, d.phone, d.completed_at, d.created_at, d.updated_at, \
    c.name AS company_name, \
    o.street AS origin_street, o.number AS origin_number, o.city AS origin_city, o.state AS origin_state, \
    o.zip_code AS origin_zip_code, o.complement AS origin_complement, o.longitude AS origin_longitude, \
    o.latitude AS origin_latitude, o.created_at AS origin_created_at, \
    t.street AS destination_street, t.number AS destination_number, t.city AS destination_city, \
    t.state AS destination_state, t.zip_code AS destination_zip_code, t.complement AS destination_complement, \
    t.longitude AS destination_longitude, t.latitude AS destination_latitude, t.created_at AS destination_created_at";

const DELIVERY_JOINS: &str = "FROM deliveries d \
    JOIN companies c ON c.id = d.company_id \
    JOIN addresses o ON o.id = d.origin_address_id \
    JOIN addresses t ON t.id = d.destination_address_id";

/// Parameters `$1..=$15`, bound by `bind_filter`. A NULL parameter disables its criterion.
const DELIVERY_FILTER: &str = "($1::uuid IS NULL OR d.company_id = $1) \
    AND ($2::uuid IS NULL OR d.courier_id = $2) \
    AND ($3::uuid IS NULL OR d.status = 'PENDING' OR d.courier_id = $3) \
    AND ($4::text IS NULL OR d.status = $4) \
    AND ($5::text IS NULL OR d.code ILIKE $5) \
    AND ($6::text IS NULL OR d.vehicle_type = $6) \
    AND ($7::bool IS NULL OR d.is_fragile = $7) \
    AND ($8::numeric IS NULL OR d.price >= $8) \
    AND ($9::numeric IS NULL OR d.price <= $9) \
    AND ($10::timestamptz IS NULL OR d.completed_at >= $10) \
    AND ($11::timestamptz IS NULL OR d.completed_at <= $11) \
    AND ($12::timestamptz IS NULL OR d.created_at >= $12) \
    AND ($13::timestamptz IS NULL OR d.created_at <= $13) \
    AND ($14::text IS NULL OR o.city ILIKE $14) \
    AND ($15::text IS NULL OR t.city ILIKE $15)";

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, sender_id, kind, status, title, message, \
    requires_action, action_status, reference_key, link, metadata, read_at, action_at, created_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    code: String,
    status: String,
    price: Decimal,
    vehicle_type: String,
    company_id: Uuid,
    courier_id: Option<Uuid>,
    origin_address_id: Uuid,
    destination_address_id: Uuid,
    height_cm: Decimal,
    width_cm: Decimal,
    length_cm: Decimal,
    weight_kg: Decimal,
    is_fragile: bool,
    information: String,
    email: String,
    phone: String,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = StoreError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        Ok(Delivery {
            id: row.id,
            code: row.code,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            price: row.price,
            vehicle_type: row.vehicle_type,
            company_id: row.company_id,
            courier_id: row.courier_id,
            origin_address_id: row.origin_address_id,
            destination_address_id: row.destination_address_id,
            package: PackageDetails {
                height_cm: row.height_cm,
                width_cm: row.width_cm,
                length_cm: row.length_cm,
                weight_kg: row.weight_kg,
                is_fragile: row.is_fragile,
                information: row.information,
                email: Masked(row.email),
                phone: Masked(row.phone),
            },
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    street: String,
    number: String,
    city: String,
    state: String,
    zip_code: String,
    complement: Option<String>,
    longitude: f64,
    latitude: f64,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: row.id,
            parts: AddressParts {
                street: row.street,
                number: row.number,
                city: row.city,
                state: row.state,
                zip_code: row.zip_code,
                complement: row.complement,
            },
            point: GeoPoint::new(row.longitude, row.latitude),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeliverySummaryRow {
    #[sqlx(flatten)]
    delivery: DeliveryRow,
    company_name: String,
    origin_street: String,
    origin_number: String,
    origin_city: String,
    origin_state: String,
    origin_zip_code: String,
    origin_complement: Option<String>,
    origin_longitude: f64,
    origin_latitude: f64,
    origin_created_at: DateTime<Utc>,
    destination_street: String,
    destination_number: String,
    destination_city: String,
    destination_state: String,
    destination_zip_code: String,
    destination_complement: Option<String>,
    destination_longitude: f64,
    destination_latitude: f64,
    destination_created_at: DateTime<Utc>,
}

impl TryFrom<DeliverySummaryRow> for DeliverySummary {
    type Error = StoreError;

    fn try_from(row: DeliverySummaryRow) -> Result<Self, Self::Error> {
        let origin = Address {
            id: row.delivery.origin_address_id,
            parts: AddressParts {
                street: row.origin_street,
                number: row.origin_number,
                city: row.origin_city,
                state: row.origin_state,
                zip_code: row.origin_zip_code,
                complement: row.origin_complement,
            },
            point: GeoPoint::new(row.origin_longitude, row.origin_latitude),
            created_at: row.origin_created_at,
        };
        let destination = Address {
            id: row.delivery.destination_address_id,
            parts: AddressParts {
                street: row.destination_street,
                number: row.destination_number,
                city: row.destination_city,
                state: row.destination_state,
                zip_code: row.destination_zip_code,
                complement: row.destination_complement,
            },
            point: GeoPoint::new(row.destination_longitude, row.destination_latitude),
            created_at: row.destination_created_at,
        };

        Ok(DeliverySummary {
            delivery: Delivery::try_from(row.delivery)?,
            company_name: row.company_name,
            origin,
            destination,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TotalsRow {
    count: i64,
    price_sum: Decimal,
}

#[derive(sqlx::FromRow)]
struct MonthlyRow {
    month: String,
    deliveries: i64,
    earnings: Decimal,
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: Option<String>,
    address_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct CourierRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
}

#[derive(sqlx::FromRow)]
struct BalanceRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for Balance {
    fn from(row: BalanceRow) -> Self {
        Balance {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExtractRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    kind: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExtractRow> for Extract {
    type Error = StoreError;

    fn try_from(row: ExtractRow) -> Result<Self, Self::Error> {
        Ok(Extract {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            kind: row.kind.parse().map_err(StoreError::Corrupt)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    sender_id: Option<Uuid>,
    kind: String,
    status: String,
    title: String,
    message: String,
    requires_action: bool,
    action_status: String,
    reference_key: Option<String>,
    link: Option<String>,
    metadata: Option<Value>,
    read_at: Option<DateTime<Utc>>,
    action_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            sender_id: row.sender_id,
            kind: row.kind.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            title: row.title,
            message: row.message,
            requires_action: row.requires_action,
            action_status: row.action_status.parse().map_err(StoreError::Corrupt)?,
            reference_key: row.reference_key,
            link: row.link,
            metadata: row.metadata,
            read_at: row.read_at,
            action_at: row.action_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VehicleTypeRow {
    name: String,
    base_fare: Decimal,
    per_km_rate: Decimal,
    rounding_scale: i32,
    max_weight_kg: Decimal,
    max_height_cm: Decimal,
    max_width_cm: Decimal,
    max_length_cm: Decimal,
}

// ============================================================================
// Queries shared by the pool and by open transactions
// ============================================================================

async fn courier_by_user<'e, E: PgExecutor<'e>>(exec: E, user_id: Uuid) -> CoreResult<Option<Courier>> {
    let row = sqlx::query_as::<_, CourierRow>("SELECT id, user_id, name FROM couriers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(exec)
        .await
        .map_err(db)?;

    Ok(row.map(|r| Courier { id: r.id, user_id: r.user_id, name: r.name }))
}

async fn address_by_id<'e, E: PgExecutor<'e>>(exec: E, id: Uuid) -> CoreResult<Option<Address>> {
    let row = sqlx::query_as::<_, AddressRow>(
        "SELECT id, street, number, city, state, zip_code, complement, longitude, latitude, created_at \
         FROM addresses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(exec)
    .await
    .map_err(db)?;

    Ok(row.map(Address::from))
}

/// Bind the scope and criteria of `DELIVERY_FILTER` as `$1..=$15`
fn bind_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    scope: DeliveryScope,
    filter: &DeliveryFilter,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    let (company, assigned, open_or_assigned) = match scope {
        DeliveryScope::All => (None, None, None),
        DeliveryScope::Company(id) => (Some(id), None, None),
        DeliveryScope::AssignedTo(id) => (None, Some(id), None),
        DeliveryScope::OpenOrAssignedTo(id) => (None, None, Some(id)),
    };

    query
        .bind(company)
        .bind(assigned)
        .bind(open_or_assigned)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.code.as_deref().map(contains_pattern))
        .bind(filter.vehicle_type.clone())
        .bind(filter.is_fragile)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.completed_from)
        .bind(filter.completed_to)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(filter.origin_city.as_deref().map(contains_pattern))
        .bind(filter.client_city.as_deref().map(contains_pattern))
}

/// `ILIKE` pattern matching `text` anywhere, with wildcards in `text` taken literally
fn contains_pattern(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn sql_bound(value: u64) -> CoreResult<i64> {
    i64::try_from(value).map_err(|_| CoreError::invalid("page is out of range"))
}

/// Value for a `SET LOCAL`-scoped timeout setting
fn timeout_setting(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis())
}

fn convert<R, T>(rows: Vec<R>) -> CoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(CoreError::from))
        .collect()
}

// ============================================================================
// Unit of work
// ============================================================================

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_delivery(&mut self, id: Uuid) -> CoreResult<Option<Delivery>> {
        let sql = format!("SELECT {} FROM deliveries WHERE id = $1 FOR UPDATE", DELIVERY_COLUMNS);
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;

        row.map(Delivery::try_from).transpose().map_err(CoreError::from)
    }

    async fn insert_address(&mut self, address: &Address) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO addresses (id, street, number, city, state, zip_code, complement, longitude, latitude, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(address.id)
        .bind(&address.parts.street)
        .bind(&address.parts.number)
        .bind(&address.parts.city)
        .bind(&address.parts.state)
        .bind(&address.parts.zip_code)
        .bind(&address.parts.complement)
        .bind(address.point.longitude)
        .bind(address.point.latitude)
        .bind(address.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> CoreResult<()> {
        let package = &delivery.package;
        sqlx::query(
            r#"
            INSERT INTO deliveries (id, code, status, price, vehicle_type, company_id, courier_id,
                origin_address_id, destination_address_id, height_cm, width_cm, length_cm, weight_kg,
                is_fragile, information, email, phone, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(delivery.id)
        .bind(&delivery.code)
        .bind(delivery.status.as_str())
        .bind(delivery.price)
        .bind(&delivery.vehicle_type)
        .bind(delivery.company_id)
        .bind(delivery.courier_id)
        .bind(delivery.origin_address_id)
        .bind(delivery.destination_address_id)
        .bind(package.height_cm)
        .bind(package.width_cm)
        .bind(package.length_cm)
        .bind(package.weight_kg)
        .bind(package.is_fragile)
        .bind(&package.information)
        .bind(package.email.expose())
        .bind(package.phone.expose())
        .bind(delivery.completed_at)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE deliveries SET status = $2, courier_id = $3, completed_at = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(delivery.id)
        .bind(delivery.status.as_str())
        .bind(delivery.courier_id)
        .bind(delivery.completed_at)
        .bind(delivery.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("delivery {} not found", delivery.id)));
        }
        Ok(())
    }

    async fn find_courier_by_user(&mut self, user_id: Uuid) -> CoreResult<Option<Courier>> {
        courier_by_user(&mut *self.tx, user_id).await
    }

    async fn lock_balance(&mut self, user_id: Uuid) -> CoreResult<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT id, user_id, amount, updated_at FROM balances WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(row.map(Balance::from))
    }

    async fn update_balance(&mut self, balance: &Balance) -> CoreResult<()> {
        sqlx::query("UPDATE balances SET amount = $2, updated_at = $3 WHERE user_id = $1")
            .bind(balance.user_id)
            .bind(balance.amount)
            .bind(balance.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn append_extract(&mut self, extract: &Extract) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO extracts (id, user_id, amount, kind, description, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(extract.id)
        .bind(extract.user_id)
        .bind(extract.amount)
        .bind(extract.kind.as_str())
        .bind(&extract.description)
        .bind(extract.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn active_admin_ids(&mut self) -> CoreResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE role = 'ADMIN' AND is_active ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db)
    }

    async fn insert_notifications(&mut self, notifications: &[Notification]) -> CoreResult<()> {
        let sql = format!(
            "INSERT INTO notifications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            NOTIFICATION_COLUMNS
        );
        for n in notifications {
            sqlx::query(&sql)
                .bind(n.id)
                .bind(n.recipient_id)
                .bind(n.sender_id)
                .bind(n.kind.as_str())
                .bind(n.status.as_str())
                .bind(&n.title)
                .bind(&n.message)
                .bind(n.requires_action)
                .bind(n.action_status.as_str())
                .bind(&n.reference_key)
                .bind(&n.link)
                .bind(&n.metadata)
                .bind(n.read_at)
                .bind(n.action_at)
                .bind(n.created_at)
                .execute(&mut *self.tx)
                .await
                .map_err(db)?;
        }
        Ok(())
    }

    async fn lock_notification(&mut self, id: Uuid, recipient_id: Uuid) -> CoreResult<Option<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE id = $1 AND recipient_id = $2 FOR UPDATE",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;

        row.map(Notification::try_from).transpose().map_err(CoreError::from)
    }

    async fn update_notification(&mut self, notification: &Notification) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, action_status = $3, read_at = $4, action_at = $5 WHERE id = $1",
        )
        .bind(notification.id)
        .bind(notification.status.as_str())
        .bind(notification.action_status.as_str())
        .bind(notification.read_at)
        .bind(notification.action_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("notification {} not found", notification.id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(db)
    }

    async fn rollback(self: Box<Self>) -> CoreResult<()> {
        self.tx.rollback().await.map_err(db)
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct PgDeliveryStore {
    pool: PgPool,
    lock_timeout: Duration,
    statement_timeout: Duration,
}

impl PgDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(15),
        }
    }

    /// Bounds on row lock waits and on single statements inside a unit of work
    pub fn with_timeouts(mut self, lock_timeout: Duration, statement_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self.statement_timeout = statement_timeout;
        self
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgDeliveryStore {
    async fn begin(&self) -> CoreResult<Box<dyn UnitOfWork>> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        // Transaction-local: the settings end with the unit of work.
        sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)")
            .bind(timeout_setting(self.lock_timeout))
            .bind(timeout_setting(self.statement_timeout))
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

#[async_trait]
impl VehicleTypeRepository for PgDeliveryStore {
    async fn find_vehicle_type(&self, name: &str) -> CoreResult<Option<VehicleType>> {
        let row = sqlx::query_as::<_, VehicleTypeRow>(
            "SELECT name, base_fare, per_km_rate, rounding_scale, max_weight_kg, max_height_cm, max_width_cm, max_length_cm \
             FROM vehicle_types WHERE name = LOWER(TRIM($1))",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.map(|r| -> CoreResult<VehicleType> {
            let rounding_scale = u32::try_from(r.rounding_scale)
                .map_err(|_| CoreError::from(StoreError::Corrupt(format!("negative rounding scale for {}", r.name))))?;
            Ok(VehicleType {
                name: r.name,
                base_fare: r.base_fare,
                per_km_rate: r.per_km_rate,
                rounding_scale,
                max_weight_kg: r.max_weight_kg,
                max_height_cm: r.max_height_cm,
                max_width_cm: r.max_width_cm,
                max_length_cm: r.max_length_cm,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl CodeRegistry for PgDeliveryStore {
    async fn delivery_code_exists(&self, code: &str) -> CoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM deliveries WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db)
    }

    async fn license_plate_exists(&self, plate: &str) -> CoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM vehicles WHERE license_plate = $1)")
            .bind(plate)
            .fetch_one(&self.pool)
            .await
            .map_err(db)
    }
}

#[async_trait]
impl AccountRepository for PgDeliveryStore {
    async fn find_company_by_user(&self, user_id: Uuid) -> CoreResult<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, user_id, name, phone, address_id FROM companies WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(|r| Company {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            phone: r.phone,
            address_id: r.address_id,
        }))
    }

    async fn find_courier_by_user(&self, user_id: Uuid) -> CoreResult<Option<Courier>> {
        courier_by_user(&self.pool, user_id).await
    }
}

#[async_trait]
impl DeliveryRepository for PgDeliveryStore {
    async fn find_address(&self, id: Uuid) -> CoreResult<Option<Address>> {
        address_by_id(&self.pool, id).await
    }

    async fn find_delivery_by_code(&self, code: &str, company_id: Uuid) -> CoreResult<Option<Delivery>> {
        let sql = format!(
            "SELECT {} FROM deliveries WHERE code = $1 AND company_id = $2",
            DELIVERY_COLUMNS
        );
        let row = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(code)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        row.map(Delivery::try_from).transpose().map_err(CoreError::from)
    }

    async fn list_deliveries(
        &self,
        scope: DeliveryScope,
        filter: &DeliveryFilter,
        window: Option<PageWindow>,
    ) -> CoreResult<Vec<DeliverySummary>> {
        let (offset, limit) = match window {
            Some(w) => (sql_bound(w.offset)?, Some(sql_bound(w.limit)?)),
            None => (0, None),
        };
        let sql = format!(
            "SELECT {} {} WHERE {} ORDER BY d.created_at DESC, d.id OFFSET $16 LIMIT $17",
            SUMMARY_COLUMNS, DELIVERY_JOINS, DELIVERY_FILTER
        );

        let rows = bind_filter(sqlx::query_as::<_, DeliverySummaryRow>(&sql), scope, &filter.normalized())
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        convert(rows)
    }

    async fn delivery_totals(&self, scope: DeliveryScope, filter: &DeliveryFilter) -> CoreResult<DeliveryTotals> {
        let sql = format!(
            "SELECT COUNT(*) AS count, COALESCE(SUM(d.price), 0) AS price_sum {} WHERE {}",
            DELIVERY_JOINS, DELIVERY_FILTER
        );

        let row = bind_filter(sqlx::query_as::<_, TotalsRow>(&sql), scope, &filter.normalized())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        Ok(DeliveryTotals {
            count: row.count.max(0) as u64,
            price_sum: row.price_sum,
        })
    }

    async fn monthly_delivery_stats(&self, courier_id: Uuid, months: u64) -> CoreResult<Vec<MonthlyDeliveryStats>> {
        let rows = sqlx::query_as::<_, MonthlyRow>(
            r#"
            SELECT TO_CHAR(created_at AT TIME ZONE 'UTC', 'YYYY-MM') AS month,
                   COUNT(*) AS deliveries,
                   COALESCE(SUM(price) FILTER (WHERE status = 'COMPLETED'), 0) AS earnings
            FROM deliveries
            WHERE courier_id = $1
            GROUP BY 1
            ORDER BY 1 DESC
            LIMIT $2
            "#,
        )
        .bind(courier_id)
        .bind(sql_bound(months)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|r| MonthlyDeliveryStats {
                month: r.month,
                deliveries: r.deliveries.max(0) as u64,
                earnings: r.earnings,
            })
            .collect())
    }
}

#[async_trait]
impl LedgerRepository for PgDeliveryStore {
    async fn find_balance(&self, user_id: Uuid) -> CoreResult<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT id, user_id, amount, updated_at FROM balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(Balance::from))
    }

    async fn sum_extracts(&self, user_id: Uuid, kinds: &[ExtractKind]) -> CoreResult<Decimal> {
        let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM extracts WHERE user_id = $1 AND kind = ANY($2)",
        )
        .bind(user_id)
        .bind(&kinds)
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    async fn recent_extracts(&self, user_id: Uuid, limit: u64) -> CoreResult<Vec<Extract>> {
        let rows = sqlx::query_as::<_, ExtractRow>(
            "SELECT id, user_id, amount, kind, description, created_at FROM extracts \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(sql_bound(limit)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        convert(rows)
    }
}

#[async_trait]
impl NotificationRepository for PgDeliveryStore {
    async fn list_notifications(&self, recipient_id: Uuid, offset: u64, limit: u64) -> CoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(recipient_id)
            .bind(sql_bound(offset)?)
            .bind(sql_bound(limit)?)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        convert(rows)
    }

    async fn count_notifications(&self, recipient_id: Uuid) -> CoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
            .bind(recipient_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(count.max(0) as u64)
    }

    async fn count_unread(&self, recipient_id: Uuid) -> CoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND status <> 'READ'",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok(count.max(0) as u64)
    }

    async fn billing_exists(&self, key: &str, user_id: Uuid) -> CoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM billings WHERE key = $1 AND company_user_id = $2)",
        )
        .bind(key)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }
}
