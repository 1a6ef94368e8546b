pub mod app_config;
pub mod error;
pub mod database;
pub mod pg_store;
pub mod redis_repo;
pub mod location_http;
pub mod memory;

pub use app_config::Config;
pub use database::DbClient;
pub use error::StoreError;
pub use pg_store::PgDeliveryStore;
pub use redis_repo::RedisClient;
pub use location_http::HttpLocationService;
pub use memory::{InMemoryCache, InMemoryDeliveryStore};
