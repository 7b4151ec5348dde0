// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// - Broadcast hub (the single pub/sub connection)
// - Observer sessions (one per connected board or customer view)
// - Health monitoring
//
// ============================================================================

mod broadcast_hub;
mod health_monitor;
mod observer;

pub use broadcast_hub::{
    unwrap_send_error, Attach, BroadcastHub, ConnectionLost, EnsureConnected, GetHubStatus, HubConfig, HubStatus,
    Publish,
};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
pub use observer::{ObserverConfig, ObserverHandle, ObserverSession, ObserverView};
