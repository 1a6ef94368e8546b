pub mod error;
pub mod cache;
pub mod location;
pub mod repository;

pub use error::{CoreError, CoreResult};
