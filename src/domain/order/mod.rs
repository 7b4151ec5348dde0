// ============================================================================
// Order Domain - lifecycle of a food order
// ============================================================================
//
// - Value objects (Order, OrderItem, OrderStatus, Money)
// - Transition gate (who may move an order where)
// - Lifecycle events (what goes on the shared topic)
// - Errors (LifecycleError, DenyReason)
// - Boards (role-gated order lists)
// - Coordinator (gate, commit, broadcast, notify)
//
// ============================================================================

pub mod board;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod transition_gate;
pub mod value_objects;

// Re-export for convenience
pub use board::Board;
pub use coordinator::{CoordinatorConfig, LifecycleCoordinator, TransitionOutcome};
pub use errors::*;
pub use events::*;
pub use transition_gate::{check_transition, next_legal_statuses, Actor, Decision, Role};
pub use value_objects::*;
