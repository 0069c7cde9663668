use sqlx::SqliteConnection;

use crate::db_types::{NewShippingRate, ShippingRate};

const RATE_COLUMNS: &str = "id, city, fee, is_default, is_active";

pub async fn find_active_rate(city: &str, conn: &mut SqliteConnection) -> Result<Option<ShippingRate>, sqlx::Error> {
    let q = format!("SELECT {RATE_COLUMNS} FROM shipping_rates WHERE city = $1 COLLATE NOCASE AND is_active LIMIT 1");
    sqlx::query_as(&q).bind(city).fetch_optional(conn).await
}

pub async fn find_default_rate(conn: &mut SqliteConnection) -> Result<Option<ShippingRate>, sqlx::Error> {
    let q = format!("SELECT {RATE_COLUMNS} FROM shipping_rates WHERE is_default AND is_active ORDER BY id LIMIT 1");
    sqlx::query_as(&q).fetch_optional(conn).await
}

pub async fn fetch_rates(conn: &mut SqliteConnection) -> Result<Vec<ShippingRate>, sqlx::Error> {
    let q = format!("SELECT {RATE_COLUMNS} FROM shipping_rates ORDER BY city");
    sqlx::query_as(&q).fetch_all(conn).await
}

/// Clears the default flag on every rate except the one for `keep_city`.
pub async fn clear_other_defaults(keep_city: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shipping_rates SET is_default = FALSE, updated_at = CURRENT_TIMESTAMP WHERE is_default AND city <> $1 \
         COLLATE NOCASE",
    )
    .bind(keep_city)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Inserts the rate, or overwrites the existing rate for the same city (compared case-insensitively).
pub async fn upsert_rate(rate: &NewShippingRate, conn: &mut SqliteConnection) -> Result<ShippingRate, sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO shipping_rates (city, fee, is_default, is_active) VALUES ($1, $2, $3, $4)
            ON CONFLICT (city) DO UPDATE SET
                city = excluded.city,
                fee = excluded.fee,
                is_default = excluded.is_default,
                is_active = excluded.is_active,
                updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&rate.city)
    .bind(rate.fee)
    .bind(rate.is_default)
    .bind(rate.is_active)
    .execute(&mut *conn)
    .await?;
    let q = format!("SELECT {RATE_COLUMNS} FROM shipping_rates WHERE city = $1 COLLATE NOCASE");
    sqlx::query_as(&q).bind(&rate.city).fetch_one(conn).await
}
