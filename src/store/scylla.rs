use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;

use super::{NotificationLedger, OrderFilter, OrderSort, OrderStore, StoreError, UpdateOutcome};
use crate::domain::notification::{Notification, NotificationId};
use crate::domain::order::{CustomerRef, Money, Order, OrderDraft, OrderId, OrderItem, OrderStatus, UserId};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// Status writes are lightweight transactions:
//   UPDATE orders SET status = ? WHERE id = ? IF status = ?
// The first result column is [applied]; when false, the next column carries
// the status that beat us.
//
// Items are stored as a JSON document; they never change after creation.
//
// ============================================================================

const ORDER_COLUMNS: &str =
    "id, customer_id, customer_name, customer_email, items, total_minor, status, created_at";

type OrderRow = (String, String, String, String, String, i64, String, DateTime<Utc>);

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn order_from_row(row: OrderRow) -> Result<Order, StoreError> {
    let (id, customer_id, customer_name, customer_email, items, total_minor, status, created_at) = row;

    let items: Vec<OrderItem> = serde_json::from_str(&items)
        .map_err(|e| unavailable(format!("corrupt items for order {}: {}", id, e)))?;
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| unavailable(format!("unknown status {:?} for order {}", status, id)))?;

    Ok(Order {
        id: OrderId(id),
        customer: CustomerRef {
            id: UserId(customer_id),
            name: customer_name,
            email: customer_email,
        },
        items,
        total_amount: Money::from_minor(total_minor),
        status,
        created_at,
    })
}

/// Read the [applied] flag of an LWT result row
fn lwt_applied(row: &Row) -> bool {
    matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))))
}

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the orders table if missing; the session must already use the keyspace
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    id text PRIMARY KEY,
                    customer_id text,
                    customer_name text,
                    customer_email text,
                    items text,
                    total_minor bigint,
                    status text,
                    created_at timestamp
                )",
                &[],
            )
            .await?;

        tracing::info!("orders table ready");
        Ok(())
    }

    async fn lwt_row(&self, query: String, values: (String, String, String)) -> Result<Row, StoreError> {
        let result = self.session.query_unpaged(query, values).await.map_err(unavailable)?;
        let rows = result.into_rows_result().map_err(unavailable)?;
        rows.maybe_first_row::<Row>()
            .map_err(unavailable)?
            .ok_or_else(|| unavailable("lightweight transaction returned no rows"))
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS),
                (id.as_str(),),
            )
            .await
            .map_err(unavailable)?;

        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows.maybe_first_row::<OrderRow>().map_err(unavailable)? {
            Some(row) => order_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        let result = match (&filter.status, &filter.customer_id) {
            (Some(status), _) => {
                self.session
                    .query_unpaged(
                        format!("SELECT {} FROM orders WHERE status = ? ALLOW FILTERING", ORDER_COLUMNS),
                        (status.as_str(),),
                    )
                    .await
            }
            (None, Some(customer_id)) => {
                self.session
                    .query_unpaged(
                        format!("SELECT {} FROM orders WHERE customer_id = ? ALLOW FILTERING", ORDER_COLUMNS),
                        (customer_id.as_str(),),
                    )
                    .await
            }
            (None, None) => {
                self.session
                    .query_unpaged(format!("SELECT {} FROM orders", ORDER_COLUMNS), &[])
                    .await
            }
        }
        .map_err(unavailable)?;

        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };

        let mut orders = Vec::new();
        for row in rows.rows::<OrderRow>().map_err(unavailable)? {
            let order = order_from_row(row.map_err(unavailable)?)?;
            // the query only narrows on one column
            if filter.matches(&order) {
                orders.push(order);
            }
        }

        sort.apply(&mut orders);
        Ok(orders)
    }

    async fn create(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
        let order = Order {
            id: OrderId::generate(),
            customer: draft.customer.clone(),
            items: draft.items(),
            total_amount: draft.total(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let items = serde_json::to_string(&order.items).map_err(unavailable)?;

        self.session
            .query_unpaged(
                format!("INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)", ORDER_COLUMNS),
                (
                    order.id.as_str(),
                    order.customer.id.as_str(),
                    order.customer.name.as_str(),
                    order.customer.email.as_str(),
                    items,
                    order.total_amount.minor_units(),
                    order.status.as_str(),
                    order.created_at,
                ),
            )
            .await
            .map_err(unavailable)?;

        tracing::info!(order_id = %order.id, total = %order.total_amount, "Inserted order");
        Ok(order)
    }

    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<UpdateOutcome, StoreError> {
        let row = self
            .lwt_row(
                "UPDATE orders SET status = ? WHERE id = ? IF status = ?".to_string(),
                (new.as_str().to_string(), id.to_string(), expected.as_str().to_string()),
            )
            .await?;

        if lwt_applied(&row) {
            return Ok(UpdateOutcome::Applied);
        }

        // a missing row reports a null status
        let current = row
            .columns
            .get(1)
            .and_then(|column| column.as_ref())
            .and_then(|value| value.as_text())
            .and_then(|raw| OrderStatus::parse(raw));

        match current {
            Some(current) => Ok(UpdateOutcome::Conflict { current }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged("DELETE FROM orders WHERE id = ? IF EXISTS", (id.as_str(),))
            .await
            .map_err(unavailable)?;
        let rows = result.into_rows_result().map_err(unavailable)?;
        let row = rows
            .maybe_first_row::<Row>()
            .map_err(unavailable)?
            .ok_or_else(|| unavailable("lightweight transaction returned no rows"))?;

        if lwt_applied(&row) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

// ============================================================================
// ScyllaDB Notification Ledger
// ============================================================================

const NOTIFICATION_COLUMNS: &str = "id, user_id, message, order_id, is_read, created_at";

type NotificationRow = (String, String, String, Option<String>, bool, DateTime<Utc>);

fn notification_from_row(row: NotificationRow) -> Notification {
    let (id, user_id, message, order_id, is_read, created_at) = row;
    Notification {
        id: NotificationId(id),
        user_id: UserId(user_id),
        message,
        order_id: order_id.map(OrderId),
        is_read,
        created_at,
    }
}

pub struct ScyllaNotificationLedger {
    session: Arc<Session>,
}

impl ScyllaNotificationLedger {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS notifications (
                    id text PRIMARY KEY,
                    user_id text,
                    message text,
                    order_id text,
                    is_read boolean,
                    created_at timestamp
                )",
                &[],
            )
            .await?;

        tracing::info!("notifications table ready");
        Ok(())
    }

    async fn all_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT {} FROM notifications WHERE user_id = ? ALLOW FILTERING",
                    NOTIFICATION_COLUMNS
                ),
                (user_id.as_str(),),
            )
            .await
            .map_err(unavailable)?;

        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };

        let mut entries = Vec::new();
        for row in rows.rows::<NotificationRow>().map_err(unavailable)? {
            entries.push(notification_from_row(row.map_err(unavailable)?));
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[async_trait]
impl NotificationLedger for ScyllaNotificationLedger {
    async fn create(
        &self,
        user_id: &UserId,
        message: &str,
        order_id: Option<&OrderId>,
    ) -> Result<Notification, StoreError> {
        let notification = Notification::new(user_id.clone(), message, order_id.cloned());

        self.session
            .query_unpaged(
                format!("INSERT INTO notifications ({}) VALUES (?, ?, ?, ?, ?, ?)", NOTIFICATION_COLUMNS),
                (
                    notification.id.as_str(),
                    notification.user_id.as_str(),
                    notification.message.as_str(),
                    notification.order_id.as_ref().map(|id| id.as_str()),
                    notification.is_read,
                    notification.created_at,
                ),
            )
            .await
            .map_err(unavailable)?;

        Ok(notification)
    }

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS),
                (id.as_str(),),
            )
            .await
            .map_err(unavailable)?;

        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        Ok(rows
            .maybe_first_row::<NotificationRow>()
            .map_err(unavailable)?
            .map(notification_from_row))
    }

    async fn list_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let mut entries = self.all_for_user(user_id).await?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let unread: Vec<(String,)> = self
            .all_for_user(user_id)
            .await?
            .into_iter()
            .filter(|n| !n.is_read)
            .map(|n| (n.id.0,))
            .collect();

        if unread.is_empty() {
            return Ok(0);
        }

        let mut batch = Batch::default();
        for _ in &unread {
            batch.append_statement("UPDATE notifications SET is_read = true WHERE id = ?");
        }

        let flipped = unread.len() as u64;
        self.session.batch(&batch, unread).await.map_err(unavailable)?;

        tracing::debug!(user_id = %user_id, flipped, "Marked notifications read");
        Ok(flipped)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged("DELETE FROM notifications WHERE id = ? IF EXISTS", (id.as_str(),))
            .await
            .map_err(unavailable)?;
        let rows = result.into_rows_result().map_err(unavailable)?;
        let applied = rows
            .maybe_first_row::<Row>()
            .map_err(unavailable)?
            .map(|row| lwt_applied(&row))
            .unwrap_or(false);

        if applied {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries against a live cluster are exercised by running the binary with
// ORDER_STORE=scylla; these tests cover row decoding.
//
// ============================================================================
