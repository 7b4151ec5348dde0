use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use super::value_objects::{Order, OrderId, OrderStatus};

// ============================================================================
// Lifecycle Events - invalidation hints on the shared topic
// ============================================================================
//
// Wire format:
//   { "type": "NEW_ORDER" | "ORDER_STATUS_UPDATE", "orderId": "...",
//     "status": "PENDING", "timestamp": "2025-01-01T08:00:00Z", "order": {...}? }
//
// The embedded order is a convenience snapshot and may be stale. Consumers
// re-read the order store instead of trusting it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "NEW_ORDER")]
    NewOrder,
    #[serde(rename = "ORDER_STATUS_UPDATE")]
    StatusUpdate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewOrder => "NEW_ORDER",
            EventKind::StatusUpdate => "ORDER_STATUS_UPDATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// Identity of a delivery, used to drop exact duplicates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new_order(order: &Order) -> Self {
        Self {
            kind: EventKind::NewOrder,
            order_id: order.id.clone(),
            status: order.status,
            timestamp: Utc::now(),
            order: Some(order.clone()),
        }
    }

    pub fn status_update(order: &Order) -> Self {
        Self {
            kind: EventKind::StatusUpdate,
            order_id: order.id.clone(),
            status: order.status,
            timestamp: Utc::now(),
            order: Some(order.clone()),
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            kind: self.kind,
            order_id: self.order_id.clone(),
            status: self.status,
            timestamp: self.timestamp,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_field_names() {
        let event = LifecycleEvent {
            kind: EventKind::StatusUpdate,
            order_id: OrderId::new("abc123"),
            status: OrderStatus::Cancelled,
            timestamp: Utc::now(),
            order: None,
        };

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ORDER_STATUS_UPDATE");
        assert_eq!(value["orderId"], "abc123");
        assert_eq!(value["status"], "CANCELLED");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        assert!(value.get("order").is_none());
    }

    #[test]
    fn test_parses_foreign_publisher_payload() {
        let payload = r#"{
            "type": "NEW_ORDER",
            "orderId": "ck9x01",
            "status": "PENDING",
            "timestamp": "2024-05-01T07:30:00.000Z"
        }"#;

        let event = LifecycleEvent::from_json(payload).unwrap();
        assert_eq!(event.kind, EventKind::NewOrder);
        assert_eq!(event.order_id, OrderId::new("ck9x01"));
        assert_eq!(event.status, OrderStatus::Pending);
        assert!(event.order.is_none());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let payload = r#"{"type":"PING","orderId":"x","status":"PENDING","timestamp":"2024-05-01T07:30:00Z"}"#;
        assert!(LifecycleEvent::from_json(payload).is_err());
    }
}
