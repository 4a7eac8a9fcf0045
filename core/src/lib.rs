//! GridBill core: the billing-cycle engine for a metered electricity
//! provider.
//!
//! Pure rule modules (`cycle`, `reading`, `fine`, `reminder`, `settlement`)
//! transform a consumer's `BillingState`; `engine` runs them against the
//! SQLite record store one transaction per consumer.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod event;
pub mod fine;
pub mod reading;
pub mod reminder;
pub mod rng;
pub mod settlement;
pub mod simulation;
pub mod store;
pub mod summary;
pub mod types;
