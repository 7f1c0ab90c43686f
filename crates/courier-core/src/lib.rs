//! Core fulfillment engine for the courier system.
//!
//! Holds the per-order fulfillment state machine, the storage-backed session
//! manager, the payout ledger and the engine that ties orders, settlement,
//! feedback, withdrawals and events together. Backends are selected from
//! configuration by the builder.

pub mod builder;
pub mod clock;
pub mod engine;
pub mod feedback;
pub mod finalization;
pub mod orders;
pub mod payouts;
pub mod state;
pub mod withdrawal;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{event_bus::EventBus, EngineError, FulfillmentEngine};
pub use feedback::{FeedbackSink, FeedbackSinkError, MemoryFeedbackSink, TracingFeedbackSink};
pub use finalization::{FinalizationHandle, FinalizationOutcome};
pub use orders::{demo_orders, load_seed_file, OrderRepository, RepositoryError, StorageOrderRepository};
pub use payouts::{LedgerError, PayoutLedger};
pub use state::{
	ConfirmationField, FeedbackStep, FulfillmentError, FulfillmentState, FulfillmentStateError,
	FulfillmentStateMachine, RatedParty, StageTimestamps,
};
pub use withdrawal::{WithdrawalHandle, WithdrawalOutcome};
