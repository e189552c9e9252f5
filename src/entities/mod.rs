pub mod box_unit;
pub mod crate_unit;
pub mod customer;
pub mod order;
pub mod pallet;
pub mod shelf;
pub mod status;

pub use status::{CarrierStatus, OrderStatus};
