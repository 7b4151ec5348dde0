// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Transition requests by outcome, with latency
// - Broadcast publishes and failures
// - Notifications written to the ledger
// - Observer refreshes
// - Transport reconnects and circuit breaker state
//
// Each instance owns its registry, scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Coordinator
    pub transitions_total: IntCounterVec,
    pub transition_duration: HistogramVec,
    pub notifications_written: IntCounterVec,

    // Broadcast
    pub broadcast_published: IntCounterVec,
    pub broadcast_failures: IntCounterVec,
    pub transport_reconnects: IntCounterVec,
    pub circuit_breaker_state: IntGauge,

    // Observers
    pub observer_refreshes: IntCounterVec,
    pub system_health: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Transition requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let transition_duration = HistogramVec::new(
            HistogramOpts::new("order_transition_duration_seconds", "Transition request latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(transition_duration.clone()))?;

        let notifications_written = IntCounterVec::new(
            Opts::new("notifications_written_total", "Notifications written to the ledger"),
            &["trigger"],
        )?;
        registry.register(Box::new(notifications_written.clone()))?;

        let broadcast_published = IntCounterVec::new(
            Opts::new("broadcast_published_total", "Lifecycle events published"),
            &["event_type"],
        )?;
        registry.register(Box::new(broadcast_published.clone()))?;

        let broadcast_failures = IntCounterVec::new(
            Opts::new("broadcast_failures_total", "Lifecycle events that failed to publish"),
            &["reason"],
        )?;
        registry.register(Box::new(broadcast_failures.clone()))?;

        let transport_reconnects = IntCounterVec::new(
            Opts::new("transport_reconnects_total", "Broadcast transport connection attempts"),
            &["transport", "outcome"],
        )?;
        registry.register(Box::new(transport_reconnects.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let observer_refreshes = IntCounterVec::new(
            Opts::new("observer_refreshes_total", "Observer re-fetches from the order store"),
            &["observer", "outcome"],
        )?;
        registry.register(Box::new(observer_refreshes.clone()))?;

        let system_health = IntGauge::new(
            "system_health_status",
            "Overall health (0=Unhealthy, 1=Degraded, 2=Healthy)",
        )?;
        registry.register(Box::new(system_health.clone()))?;

        Ok(Self {
            registry,
            transitions_total,
            transition_duration,
            notifications_written,
            broadcast_published,
            broadcast_failures,
            transport_reconnects,
            circuit_breaker_state,
            observer_refreshes,
            system_health,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, outcome: &str, duration_secs: f64) {
        self.transitions_total.with_label_values(&[outcome]).inc();
        self.transition_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    pub fn record_notification(&self, trigger: &str) {
        self.notifications_written.with_label_values(&[trigger]).inc();
    }

    pub fn record_publish(&self, event_type: &str, success: bool, reason: &str) {
        if success {
            self.broadcast_published.with_label_values(&[event_type]).inc();
        } else {
            self.broadcast_failures.with_label_values(&[reason]).inc();
        }
    }

    pub fn record_connect(&self, transport: &str, success: bool) {
        let outcome = if success { "connected" } else { "failed" };
        self.transport_reconnects.with_label_values(&[transport, outcome]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: i64) {
        self.circuit_breaker_state.set(state);
    }

    pub fn record_refresh(&self, observer: &str, success: bool) {
        let outcome = if success { "ok" } else { "failed" };
        self.observer_refreshes.with_label_values(&[observer, outcome]).inc();
    }
}
