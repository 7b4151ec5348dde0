use std::sync::Arc;

use super::value_objects::{Notification, NotificationId};
use crate::domain::order::{Actor, UserId};
use crate::store::{NotificationLedger, StoreError};

// ============================================================================
// Inbox - a user's view of the notification ledger
// ============================================================================

pub const DEFAULT_PAGE: usize = 50;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InboxError {
    #[error("notification not found: {0}")]
    NotFound(NotificationId),

    /// The ledger lost a record it was asked about, with no id to report
    #[error("notification record not found")]
    Missing,

    #[error("notification belongs to another user")]
    NotOwner,

    #[error("notification ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for InboxError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => InboxError::Missing,
            StoreError::Unavailable(reason) => InboxError::Unavailable(reason),
        }
    }
}

#[derive(Clone)]
pub struct Inbox {
    ledger: Arc<dyn NotificationLedger>,
}

impl Inbox {
    pub fn new(ledger: Arc<dyn NotificationLedger>) -> Self {
        Self { ledger }
    }

    /// Newest first, at most `DEFAULT_PAGE` entries
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Notification>, InboxError> {
        Ok(self.ledger.list_by_user(&actor.id, DEFAULT_PAGE).await?)
    }

    pub async fn unread_count(&self, actor: &Actor) -> Result<usize, InboxError> {
        let all = self.ledger.list_by_user(&actor.id, usize::MAX).await?;
        Ok(all.iter().filter(|n| !n.is_read).count())
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> Result<u64, InboxError> {
        let flipped = self.ledger.mark_all_read(&actor.id).await?;
        tracing::debug!(user = %actor.id, flipped, "Inbox marked read");
        Ok(flipped)
    }

    /// Only the addressee may delete an entry
    pub async fn delete(&self, actor: &Actor, id: &NotificationId) -> Result<(), InboxError> {
        let Some(entry) = self.ledger.find_by_id(id).await? else {
            return Err(InboxError::NotFound(id.clone()));
        };
        if !owns(&actor.id, &entry) {
            return Err(InboxError::NotOwner);
        }

        match self.ledger.delete(id).await {
            Ok(()) => Ok(()),
            // deleted concurrently by the same user
            Err(StoreError::NotFound) => Err(InboxError::NotFound(id.clone())),
            Err(error) => Err(error.into()),
        }
    }
}

fn owns(user: &UserId, entry: &Notification) -> bool {
    &entry.user_id == user
}
