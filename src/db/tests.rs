//! Integration tests for pool creation, exercised against a real file so
//! `create_if_missing` and the connection options get coverage `Dao`'s own
//! in-memory unit tests don't reach.

use super::create_pool;

#[tokio::test]
async fn create_pool_creates_missing_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ballcone.sqlite3");

    let pool = create_pool(path.to_str().unwrap()).await.expect("pool creation failed");
    assert!(path.exists());

    sqlx::query("SELECT 1").execute(&pool).await.expect("pool is not queryable");
}
