//! The Diesel adapters are reachable through `outbound::persistence`.

use moderation_backend::outbound::persistence::{
    MigrationError, PoolConfig, run_pending_migrations,
};
use rstest::rstest;

#[rstest]
fn pool_config_is_built_through_the_public_path() {
    let config = PoolConfig::new("postgres://localhost/moderation").with_max_size(0);
    let rendered = format!("{config:?}");
    assert!(rendered.contains("max_size: 1"));
}

#[tokio::test]
async fn migrations_report_unusable_connection_strings() {
    let err = run_pending_migrations("not-a-connection-string")
        .await
        .expect_err("connection string is rejected");
    assert!(matches!(err, MigrationError::Connect { .. }));
}
