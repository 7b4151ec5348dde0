use crate::domain::order::{Order, OrderStatus};

// ============================================================================
// Customer-facing message text
// ============================================================================

pub const READY_SUBJECT: &str = "Your order is ready";

pub fn order_placed() -> String {
    "Your order has been placed".to_string()
}

/// Message for a status the customer is told about, `None` for the rest
pub fn for_status(order: &Order) -> Option<String> {
    match order.status {
        OrderStatus::Preparing => Some(format!("Order {} is being prepared", order.id.short())),
        OrderStatus::Ready => Some(ready_summary(order)),
        OrderStatus::Cancelled => Some(format!("Order {} has been cancelled", order.id.short())),
        OrderStatus::Pending | OrderStatus::Completed => None,
    }
}

/// Item-by-item pickup summary, shared by the inbox entry and the email
pub fn ready_summary(order: &Order) -> String {
    let items = order
        .items
        .iter()
        .map(|item| format!("{} × {}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your order:\n{}\nTotal: ${}\nReady for pickup at the counter",
        items, order.total_amount
    )
}
