//! Yard Types - Core records for RFID gate tracking
//!
//! These types describe the flat, id-keyed records the scan reconciliation
//! engine reads and writes. Records reference each other by id only; there is
//! no live navigation between a crossing, its truck and the cases raised
//! against it. Lookups are built explicitly by whoever needs them.
//!
//! ## Key Concepts
//!
//! - **RawScanRecord**: a decoded tag read waiting to be consumed
//! - **GateCrossing**: a reconciled Entry or Exit of one truck at one reader
//! - **KitTemplate**: the equipment a truck is expected to carry
//! - **MissingEquipmentCase**: per-truck tracking of equipment gone missing
//! - **EquipmentAssignment**: custody of a unit by a truck
//! - **SeverityTable**: validated cost ranges mapping missing value to a tier
//! - **Alert**: deduplicated notification record

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alert;
pub mod assignment;
pub mod case;
pub mod catalog;
pub mod crossing;
pub mod epc;
pub mod ids;
pub mod scan;
pub mod severity;

pub use alert::{Alert, AlertDedupKey, AlertRules, AlertSource};
pub use assignment::EquipmentAssignment;
pub use case::{CaseItem, CaseStatus, MissingEquipmentCase};
pub use catalog::{Equipment, KitTemplate, Reader, ReaderMode, Truck};
pub use crossing::{Direction, GateCrossing, GateCrossingItem, SessionKey};
pub use epc::Epc;
pub use ids::{
    AlertId, AssignmentId, CaseId, CaseItemId, CrossingId, CrossingItemId, DriverId, EquipmentId,
    EquipmentTypeId, ReaderId, RunId, ScanId, SiteId, TruckId,
};
pub use scan::{RawScanRecord, ScanBatch, ScanClaim, ScanEvent};
pub use severity::{CostRange, SeverityConfigError, SeverityTable, SeverityTier, TierSpec};
