use async_trait::async_trait;

use crate::domain::notification::READY_SUBJECT;

// ============================================================================
// Ready Notifier - best-effort side channel for READY orders
// ============================================================================

#[async_trait]
pub trait ReadyNotifier: Send + Sync + 'static {
    async fn notify_ready(&self, to: &str, summary: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ReadyNotifier for LogNotifier {
    async fn notify_ready(&self, to: &str, summary: &str) -> anyhow::Result<()> {
        if to.trim().is_empty() {
            anyhow::bail!("customer has no contact address");
        }
        tracing::info!(to, subject = READY_SUBJECT, body = summary, "📧 Ready notification");
        Ok(())
    }
}
