// ============================================================================
// Core Actor Abstractions
// ============================================================================

pub mod health;

pub use self::health::{ComponentHealth, HealthStatus};
