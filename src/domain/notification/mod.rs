// ============================================================================
// Notification Domain - per-user inbox entries derived from order changes
// ============================================================================

pub mod inbox;
pub mod messages;
pub mod value_objects;

pub use inbox::{Inbox, InboxError};
pub use messages::READY_SUBJECT;
pub use value_objects::*;
