use sqlx::SqliteConnection;

use crate::db_types::CartItem;

pub async fn fetch_cart(customer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE customer_id = $1 ORDER BY added_at, product_id")
        .bind(customer_id)
        .fetch_all(conn)
        .await
}

pub async fn add_to_cart(customer_id: &str, item: &CartItem, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO cart_items (customer_id, product_id, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id) DO UPDATE SET quantity = quantity + excluded.quantity
        "#,
    )
    .bind(customer_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn clear_cart(customer_id: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1").bind(customer_id).execute(conn).await?;
    Ok(result.rows_affected())
}
