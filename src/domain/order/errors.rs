use super::value_objects::{OrderId, OrderStatus};

// ============================================================================
// Order Lifecycle Errors
// ============================================================================

/// Why the transition gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("actor does not own this resource")]
    NotOwner,

    #[error("role is not allowed to perform this transition")]
    InsufficientRole,

    #[error("transition is not part of the order lifecycle")]
    IllegalStateTransition,

    #[error("order is already in the requested status")]
    NoOp,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("permission denied: {0}")]
    PermissionDenied(DenyReason),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order changed concurrently: expected {expected}, found {found}")]
    ConflictingTransition { expected: OrderStatus, found: OrderStatus },

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("broadcast channel unavailable: {0}")]
    ChannelUnavailable(String),
}

impl LifecycleError {
    /// Validation failures are final for the request; infrastructure ones may be retried by the caller
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LifecycleError::NotFound(_)
                | LifecycleError::PermissionDenied(_)
                | LifecycleError::InvalidTransition { .. }
                | LifecycleError::InvalidOrder(_)
        )
    }

    /// Map a gate denial onto the caller-facing taxonomy
    pub fn from_denial(reason: DenyReason, from: OrderStatus, to: OrderStatus) -> Self {
        match reason {
            DenyReason::NotOwner | DenyReason::InsufficientRole => {
                LifecycleError::PermissionDenied(reason)
            }
            DenyReason::IllegalStateTransition | DenyReason::NoOp => {
                LifecycleError::InvalidTransition { from, to }
            }
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::NotFound(_) => "not_found",
            LifecycleError::PermissionDenied(_) => "permission_denied",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::ConflictingTransition { .. } => "conflicting_transition",
            LifecycleError::InvalidOrder(_) => "invalid_order",
            LifecycleError::StoreUnavailable(_) => "store_unavailable",
            LifecycleError::ChannelUnavailable(_) => "channel_unavailable",
        }
    }
}
