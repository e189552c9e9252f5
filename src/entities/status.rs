//! Status vocabularies shared by the entities and services.
//!
//! The wire strings are part of the external interface (labels, reports,
//! operator UI) and are kept exactly as the facility uses them, mixed
//! casing included.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle status of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum OrderStatus {
    #[strum(serialize = "Created")]
    #[serde(rename = "Created")]
    Created,
    #[strum(serialize = "processing complete")]
    #[serde(rename = "processing complete")]
    ProcessingComplete,
    #[strum(serialize = "Ready for pickup")]
    #[serde(rename = "Ready for pickup")]
    ReadyForPickup,
    #[strum(serialize = "Picked up")]
    #[serde(rename = "Picked up")]
    PickedUp,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Created => 0,
            OrderStatus::ProcessingComplete => 1,
            OrderStatus::ReadyForPickup => 2,
            OrderStatus::PickedUp => 3,
        }
    }

    /// Whether a normal (non-override) transition to `next` is allowed.
    /// The lifecycle is monotonic; skipping forward is fine, going back
    /// requires the explicit override path.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// Derived occupancy status of a pallet or shelf. Never set directly by
/// callers; always recomputed from holding vs capacity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CarrierStatus {
    Available,
    Full,
    Loading,
    Empty,
}

impl CarrierStatus {
    /// Authoritative derivation used by recounts: empty, full, or available.
    pub fn derive(holding: i32, capacity: i32) -> CarrierStatus {
        if holding <= 0 {
            CarrierStatus::Empty
        } else if holding >= capacity {
            CarrierStatus::Full
        } else {
            CarrierStatus::Available
        }
    }

    /// Derivation used on the incremental assignment path, where a carrier
    /// that just gained or lost a unit is "available" unless full.
    pub fn derive_incremental(holding: i32, capacity: i32) -> CarrierStatus {
        if holding >= capacity {
            CarrierStatus::Full
        } else {
            CarrierStatus::Available
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wire_strings_are_exact() {
        assert_eq!(OrderStatus::ProcessingComplete.to_string(), "processing complete");
        assert_eq!(OrderStatus::ReadyForPickup.to_string(), "Ready for pickup");
        assert_eq!(
            OrderStatus::from_str("Picked up").unwrap(),
            OrderStatus::PickedUp
        );
        assert_eq!(CarrierStatus::Available.to_string(), "available");
    }

    #[test]
    fn lifecycle_is_monotonic() {
        assert!(OrderStatus::Created.can_advance_to(OrderStatus::ReadyForPickup));
        assert!(OrderStatus::ProcessingComplete.can_advance_to(OrderStatus::PickedUp));
        assert!(!OrderStatus::PickedUp.can_advance_to(OrderStatus::Created));
        assert!(!OrderStatus::ReadyForPickup.can_advance_to(OrderStatus::ReadyForPickup));
    }

    #[test]
    fn carrier_status_derivation() {
        assert_eq!(CarrierStatus::derive(0, 4), CarrierStatus::Empty);
        assert_eq!(CarrierStatus::derive(2, 4), CarrierStatus::Available);
        assert_eq!(CarrierStatus::derive(4, 4), CarrierStatus::Full);
        assert_eq!(CarrierStatus::derive_incremental(0, 4), CarrierStatus::Available);
        assert_eq!(CarrierStatus::derive_incremental(4, 4), CarrierStatus::Full);
    }
}
