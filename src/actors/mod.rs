// ============================================================================
// Actors Module
// ============================================================================
//
// kameo actors for the concurrent parts of the system.
//
// Structure:
// - core/           - Health types shared by every component
// - infrastructure/ - BroadcastHub, ObserverSession, HealthMonitorActor
//
// The transition gate and coordinator are plain async code, not actors:
// requests are served concurrently and serialize only at the store.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthStatus};
pub use self::infrastructure::{
    unwrap_send_error, Attach, BroadcastHub, ConnectionLost, EnsureConnected, GetHubStatus, GetSystemHealth,
    HealthMonitorActor, HubConfig, HubStatus, ObserverConfig, ObserverHandle, ObserverSession, ObserverView, Publish,
    SystemHealth, UpdateHealth,
};
