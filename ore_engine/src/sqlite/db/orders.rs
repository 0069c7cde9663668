use chrono::{DateTime, Utc};
use log::trace;
use ore_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OrderStatuses,
        PaymentDetails,
        PaymentMethod,
        PaymentStatus,
        ShippingInfo,
        ShippingStatus,
    },
    payment_objects::ProviderKind,
};

/// The flat shape of a row in the `orders` table.
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: String,
    customer_email: String,
    subtotal: Money,
    shipping_fee: Money,
    total_price: Money,
    currency: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    order_status: OrderStatusType,
    shipping_status: ShippingStatus,
    full_name: String,
    phone: String,
    city: String,
    address_line: String,
    transaction_id: Option<String>,
    payment_provider: Option<ProviderKind>,
    payment_date: Option<DateTime<Utc>>,
    payment_info: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            customer_email: self.customer_email,
            items,
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            total_price: self.total_price,
            currency: self.currency,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            order_status: self.order_status,
            shipping: ShippingInfo {
                full_name: self.full_name,
                phone: self.phone,
                city: self.city,
                address_line: self.address_line,
                status: self.shipping_status,
            },
            payment_details: PaymentDetails {
                transaction_id: self.transaction_id,
                provider: self.payment_provider,
                payment_date: self.payment_date,
                payment_info: self.payment_info,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Inserts the order and its line items. This is not atomic. Embed the call in a transaction (passing `&mut tx`) if
/// you need atomicity.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                customer_id,
                customer_email,
                subtotal,
                shipping_fee,
                total_price,
                currency,
                payment_method,
                full_name,
                phone,
                city,
                address_line,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13);
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer.id)
    .bind(&order.customer.email)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.total_price)
    .bind(&order.currency)
    .bind(order.payment_method)
    .bind(&order.shipping.full_name)
    .bind(&order.shipping.phone)
    .bind(&order.shipping.city)
    .bind(&order.shipping.address_line)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (
                    order_id, position, product_id, seller_id, product_name, quantity, price_at_purchase
                ) VALUES ($1, $2, $3, $4, $5, $6, $7);
            "#,
        )
        .bind(&order.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.seller_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price_at_purchase)
        .execute(&mut *conn)
        .await?;
    }
    trace!("🗃️ Order {} inserted with {} items", order.id, order.items.len());
    Ok(())
}

async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT product_id, seller_id, product_name, quantity, price_at_purchase
            FROM order_items WHERE order_id = $1 ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

async fn hydrate(row: Option<OrderRow>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match row {
        Some(row) => {
            let items = fetch_items(&row.id, conn).await?;
            Ok(Some(row.into_order(items)))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    hydrate(row, conn).await
}

pub async fn fetch_order_by_transaction_id(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE transaction_id = $1")
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(row, conn).await
}

pub async fn fetch_orders_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at, id")
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_items(&row.id, conn).await?;
        orders.push(row.into_order(items));
    }
    Ok(orders)
}

/// Returns the number of rows updated: 1 if the session was recorded, 0 if the order was not eligible.
pub async fn attach_transaction_id(
    order_id: &OrderId,
    provider: ProviderKind,
    transaction_id: &str,
    payment_info: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                transaction_id = $1,
                payment_provider = $2,
                payment_status = 'PENDING',
                payment_info = $3,
                updated_at = $4
            WHERE id = $5
              AND payment_status <> 'PAID'
              AND order_status <> 'CANCELLED'
              AND (transaction_id IS NULL OR payment_status = 'FAILED')
        "#,
    )
    .bind(transaction_id)
    .bind(provider)
    .bind(payment_info)
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_paid(
    order_id: &OrderId,
    payment_info: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                payment_status = 'PAID',
                order_status = CASE WHEN order_status = 'PENDING' THEN 'PAID' ELSE order_status END,
                payment_date = $1,
                payment_info = $2,
                updated_at = $1
            WHERE id = $3 AND payment_status <> 'PAID'
        "#,
    )
    .bind(now)
    .bind(payment_info)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_failed(
    order_id: &OrderId,
    payment_info: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET payment_status = 'FAILED', payment_info = $1, updated_at = $2
            WHERE id = $3 AND payment_status = 'PENDING'
        "#,
    )
    .bind(payment_info)
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn compare_and_set_statuses(
    order_id: &OrderId,
    expected: OrderStatuses,
    new: OrderStatuses,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                payment_status = $1,
                order_status = $2,
                shipping_status = $3,
                payment_date = CASE WHEN $1 = 'PAID' AND payment_date IS NULL THEN $4 ELSE payment_date END,
                updated_at = $4
            WHERE id = $5 AND payment_status = $6 AND order_status = $7 AND shipping_status = $8
        "#,
    )
    .bind(new.payment_status)
    .bind(new.order_status)
    .bind(new.shipping_status)
    .bind(now)
    .bind(order_id)
    .bind(expected.payment_status)
    .bind(expected.order_status)
    .bind(expected.shipping_status)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
