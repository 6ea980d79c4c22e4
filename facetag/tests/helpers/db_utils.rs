//! Database Test Utilities

use facetag::db::CheckpointStore;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary on-disk test database with tables created
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("facetag.db");

    let pool = facetag::db::init_database_pool(&db_path)
        .await
        .expect("Failed to create test database");

    (temp_dir, pool)
}

/// Checkpoint store for `tag_space` in a fresh test database
pub async fn create_test_checkpoints(tag_space: &str) -> (TempDir, CheckpointStore) {
    let (temp_dir, pool) = create_test_db().await;
    (temp_dir, CheckpointStore::new(pool, tag_space))
}
