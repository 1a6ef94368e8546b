pub mod pricing;
pub mod simulation;

pub use pricing::PricingEngine;
pub use simulation::{GeoPricingCache, RouteOrigin, Simulation, SIMULATION_TTL_SECONDS};
