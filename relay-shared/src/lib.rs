pub mod models;
pub mod pii;

pub use models::address::{Address, AddressParts, GeoPoint, RouteEstimate};
pub use models::delivery::{
    Company, Courier, Delivery, DeliveryDetail, DeliveryFilter, DeliveryStatus, DeliverySummary,
    MonthlyDeliveryStats, PackageDetails,
};
pub use models::ledger::{Balance, Extract, ExtractKind};
pub use models::notification::{ActionStatus, Notification, NotificationKind, NotificationStatus};
pub use models::principal::{Principal, Role};
pub use models::vehicle::VehicleType;
