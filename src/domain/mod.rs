// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - order        - lifecycle state machine, gate, coordinator
// - notification - customer inbox derived from lifecycle changes
//
// ============================================================================

pub mod notification;
pub mod order;
