// ============================================================================
// Order Lifecycle Coordinator
// ============================================================================
//
// Moves food orders through PENDING → PREPARING → READY → COMPLETED (or
// CANCELLED), gates every move by role and ownership, commits it with a
// compare-and-set, and fans the change out to every connected board over a
// shared pub/sub topic. Observers treat events as hints and re-read the store.
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod store;
pub mod utils;
