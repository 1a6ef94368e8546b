pub mod address;
pub mod delivery;
pub mod ledger;
pub mod notification;
pub mod principal;
pub mod vehicle;
