pub mod constants;
pub mod eviction;
pub mod inventory;
pub mod telemetry;
