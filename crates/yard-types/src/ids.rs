//! Strongly-typed identifiers for yard records
//!
//! All IDs are UUID-based but wrapped in newtype structs for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a raw tag read
    ScanId,
    "scan"
);
uuid_id!(
    /// Identifier of a gate reader
    ReaderId,
    "reader"
);
uuid_id!(
    /// Identifier of a yard site
    SiteId,
    "site"
);
uuid_id!(
    /// Identifier of a truck
    TruckId,
    "truck"
);
uuid_id!(
    /// Identifier of a driver
    DriverId,
    "driver"
);
uuid_id!(
    /// Identifier of an equipment unit
    EquipmentId,
    "equipment"
);
uuid_id!(
    /// Identifier of an equipment type
    EquipmentTypeId,
    "eqtype"
);
uuid_id!(
    /// Identifier of a gate crossing
    CrossingId,
    "crossing"
);
uuid_id!(
    /// Identifier of a gate crossing line item
    CrossingItemId,
    "crossing-item"
);
uuid_id!(
    /// Identifier of a missing-equipment case
    CaseId,
    "case"
);
uuid_id!(
    /// Identifier of a missing-equipment case item
    CaseItemId,
    "case-item"
);
uuid_id!(
    /// Identifier of a custody assignment
    AssignmentId,
    "assignment"
);
uuid_id!(
    /// Identifier of an alert
    AlertId,
    "alert"
);
uuid_id!(
    /// Identifier of one reconciliation run, used to claim scans
    RunId,
    "run"
);
