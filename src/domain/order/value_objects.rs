use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Opaque order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, the way boards and messages label an order
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque user identifier supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount in currency minor units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// `None` on overflow
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// `None` on overflow
    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

/// Always two decimal places, e.g. `12.50`
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        OrderStatus::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Menu entry as priced at ordering time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_request: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// Customer fields joined onto an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer: CustomerRef,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn customer_id(&self) -> &UserId {
        &self.customer.id
    }
}

// ============================================================================
// Order Draft - input to order placement
// ============================================================================

#[derive(Debug, Clone)]
pub struct DraftLine {
    pub menu_item: MenuItem,
    pub quantity: u32,
    pub special_request: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer: CustomerRef,
    pub lines: Vec<DraftLine>,
}

impl OrderDraft {
    pub fn new(customer: CustomerRef) -> Self {
        Self { customer, lines: Vec::new() }
    }

    pub fn line(mut self, menu_item: MenuItem, quantity: u32, special_request: Option<&str>) -> Self {
        self.lines.push(DraftLine {
            menu_item,
            quantity,
            special_request: special_request.map(str::to_string),
        });
        self
    }

    /// Reject empty drafts, zero quantities, negative prices, unavailable
    /// menu items and totals that do not fit
    pub fn validate(&self) -> Result<(), String> {
        if self.lines.is_empty() {
            return Err("order must contain at least one item".to_string());
        }

        for line in &self.lines {
            if line.quantity == 0 {
                return Err(format!("invalid quantity 0 for {}", line.menu_item.name));
            }
            if line.menu_item.price.minor_units() < 0 {
                return Err(format!("{} has a negative price", line.menu_item.name));
            }
            if !line.menu_item.is_available {
                return Err(format!("{} is not available", line.menu_item.name));
            }
        }

        if self.checked_total().is_none() {
            return Err("order total is out of range".to_string());
        }

        Ok(())
    }

    pub fn items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| OrderItem {
                menu_item_id: line.menu_item.id.clone(),
                name: line.menu_item.name.clone(),
                unit_price: line.menu_item.price,
                quantity: line.quantity,
                special_request: line.special_request.clone(),
            })
            .collect()
    }

    pub fn checked_total(&self) -> Option<Money> {
        self.lines.iter().try_fold(Money::default(), |total, line| {
            total.checked_add(line.menu_item.price.checked_times(line.quantity)?)
        })
    }

    /// Total of a validated draft; saturates instead of overflowing
    pub fn total(&self) -> Money {
        self.checked_total().unwrap_or(Money(i64::MAX))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(name: &str, cents: i64) -> MenuItem {
        MenuItem {
            id: format!("menu-{}", name),
            name: name.to_string(),
            price: Money::from_minor(cents),
            is_available: true,
        }
    }

    fn customer() -> CustomerRef {
        CustomerRef {
            id: UserId::new("cust-1"),
            name: "Mei".to_string(),
            email: "mei@example.com".to_string(),
        }
    }

    #[test]
    fn test_money_formats_two_decimals() {
        assert_eq!(Money::from_minor(1250).to_string(), "12.50");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-199).to_string(), "-1.99");
    }

    #[test]
    fn test_draft_total_is_sum_of_price_times_quantity() {
        let draft = OrderDraft::new(customer())
            .line(menu("toast", 350), 2, None)
            .line(menu("tea", 225), 1, Some("less ice"));

        assert_eq!(draft.total(), Money::from_minor(925));
        let items = draft.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].special_request.as_deref(), Some("less ice"));
        let summed = items
            .iter()
            .try_fold(Money::default(), |acc, item| acc.checked_add(item.line_total()?));
        assert_eq!(summed, Some(draft.total()));
    }

    #[test]
    fn test_draft_validation() {
        assert!(OrderDraft::new(customer()).validate().is_err());
        assert!(OrderDraft::new(customer()).line(menu("egg", 100), 0, None).validate().is_err());

        let mut sold_out = menu("bagel", 300);
        sold_out.is_available = false;
        assert!(OrderDraft::new(customer()).line(sold_out, 1, None).validate().is_err());

        assert!(OrderDraft::new(customer()).line(menu("egg", 100), 3, None).validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_negative_prices_and_overflow() {
        let refund = OrderDraft::new(customer()).line(menu("coupon", -500), 1, None);
        assert!(refund.validate().unwrap_err().contains("negative price"));

        let huge = OrderDraft::new(customer()).line(menu("caviar", i64::MAX / 2), 3, None);
        assert_eq!(huge.checked_total(), None);
        assert!(huge.validate().unwrap_err().contains("out of range"));

        let wide = OrderDraft::new(customer())
            .line(menu("a", i64::MAX - 10), 1, None)
            .line(menu("b", 20), 1, None);
        assert!(wide.validate().is_err());

        assert_eq!(Money::from_minor(i64::MAX).checked_times(2), None);
        assert_eq!(Money::from_minor(250).checked_times(4), Some(Money::from_minor(1000)));
    }

    #[test]
    fn test_order_status_wire_names() {
        let json = serde_json::to_string(&OrderStatus::Preparing).unwrap();
        assert_eq!(json, "\"PREPARING\"");

        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_order_id_short_label() {
        assert_eq!(OrderId::new("abc123").short(), "abc123");
        assert_eq!(OrderId::new("0123456789abcdef").short(), "01234567");
    }
}
