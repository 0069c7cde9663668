use log::*;

use crate::SqliteDatabase;

/// A fresh database file under the system temp directory.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/ore_test_store_{}.db", dir.display(), rand::random::<u64>())
}

/// Loads `.env.test`, initialises logging and returns a migrated, empty database.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    let db = SqliteDatabase::new_with_url(url, 25).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete for {url}");
    db
}
