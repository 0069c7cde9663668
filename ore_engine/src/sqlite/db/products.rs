use sqlx::SqliteConnection;

use crate::db_types::Product;

pub async fn fetch_product(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT id, seller_id, name, price, stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_product(product: &Product, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO products (id, seller_id, name, price, stock) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                seller_id = excluded.seller_id,
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&product.id)
    .bind(&product.seller_id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .execute(conn)
    .await?;
    Ok(())
}

/// The check and the decrement happen in one statement, so two buyers racing for the last unit cannot both win.
pub async fn decrement_stock_if_sufficient(
    product_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND stock >= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn restore_stock(product_id: &str, quantity: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(quantity)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
