//! Shared types for the courier fulfillment system.
//!
//! Defines order records, fulfillment stages, confirmation and feedback
//! records, withdrawals, events and storage keys used across every courier
//! crate.

/// Events published while orders are fulfilled.
pub mod events;
/// Confirmation, feedback and payout records.
pub mod fulfillment;
/// Order records from the order source.
pub mod order;
/// Name-based backend registration.
pub mod registry;
/// Fulfillment stages, origin statuses and actions.
pub mod stage;
/// Storage namespaces.
pub mod storage;
/// Withdrawal requests.
pub mod withdrawal;

pub use events::*;
pub use fulfillment::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use stage::*;
pub use storage::*;
pub use withdrawal::*;
