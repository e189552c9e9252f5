// Fulfillment core services
pub mod analytics;
pub mod assignment;
pub mod boxes;
pub mod crates;
pub mod orders;
