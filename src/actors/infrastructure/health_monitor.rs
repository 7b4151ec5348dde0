use chrono::Utc;
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::metrics::Metrics;

// ============================================================================
// Health Monitor Actor - Aggregates component health
// ============================================================================
//
// Responsibilities:
// - Track the last reported status of each component
// - Fold them into one system status for the /health endpoint
// - Log the system status periodically and mirror it into a gauge
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

pub struct GetSystemHealth;

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: chrono::DateTime<Utc>,
}

// Implement Reply for SystemHealth to use it as a message reply type
impl Reply for SystemHealth {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    metrics: Option<Arc<Metrics>>,
    log_interval: Duration,
}

impl HealthMonitorActor {
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            components: HashMap::new(),
            metrics,
            log_interval: Duration::from_secs(30),
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    fn snapshot(&self) -> SystemHealth {
        SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("HealthMonitorActor started");

        let interval_period = state.log_interval;
        let monitor = actor_ref.downgrade();

        // Periodic system health log; ends once the actor is gone
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(monitor) = monitor.upgrade() else { break };
                match monitor.ask(GetSystemHealth).await {
                    Ok(health) => match health.overall_status {
                        HealthStatus::Healthy => tracing::debug!("System health check: Healthy"),
                        HealthStatus::Degraded(ref msg) => {
                            tracing::warn!("System health check: Degraded - {}", msg)
                        }
                        HealthStatus::Unhealthy(ref msg) => {
                            tracing::error!("System health check: Unhealthy - {}", msg)
                        }
                    },
                    Err(_) => break,
                }
            }
        });

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let mut health = ComponentHealth::new(msg.component.clone(), msg.status.clone());
        if let Some(details) = msg.details {
            health = health.with_details(details);
        }

        tracing::debug!(
            component = %msg.component,
            status = ?msg.status,
            "Updated component health"
        );

        self.components.insert(msg.component, health);

        if let Some(metrics) = &self.metrics {
            metrics.system_health.set(self.compute_overall_status().as_gauge());
        }
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unhealthy_component_dominates() {
        let monitor = HealthMonitorActor::spawn(HealthMonitorActor::new(None));

        monitor
            .tell(UpdateHealth {
                component: "broadcast".to_string(),
                status: HealthStatus::Unhealthy("link down".to_string()),
                details: None,
            })
            .await
            .unwrap();
        monitor
            .tell(UpdateHealth {
                component: "order_store".to_string(),
                status: HealthStatus::Degraded("slow".to_string()),
                details: None,
            })
            .await
            .unwrap();

        let health = monitor.ask(GetSystemHealth).await.unwrap();
        assert_eq!(health.components.len(), 2);
        assert_eq!(
            health.overall_status,
            HealthStatus::Unhealthy("broadcast: link down".to_string())
        );
    }

    #[tokio::test]
    async fn test_healthy_report_sets_gauge() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let monitor = HealthMonitorActor::spawn(HealthMonitorActor::new(Some(metrics.clone())));

        monitor
            .tell(UpdateHealth {
                component: "broadcast".to_string(),
                status: HealthStatus::Healthy,
                details: Some("connected".to_string()),
            })
            .await
            .unwrap();

        let health = monitor.ask(GetSystemHealth).await.unwrap();
        assert!(health.overall_status.is_healthy());
        assert_eq!(metrics.system_health.get(), 2);
    }
}
