use sqlx::PgPool;
use std::time::Duration;

use crate::configuration::SweeperSettings;

/// Promotes `write_operations` rows that have sat in `pending` past
/// `grace_period_secs` to `failed`. Addresses the open question in the
/// design notes: a processor crash after the pending insert, or a message
/// that exhausted retries and was dead-lettered without ever recording a
/// ledger failure, would otherwise leave the row `pending` forever. Off by
/// default; operators opt in because "stale" is a policy call this pipeline
/// doesn't make on their behalf.
pub async fn run_sweeper(pool: PgPool, settings: SweeperSettings) {
    if !settings.enabled {
        tracing::info!("ledger sweeper disabled, not starting");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(settings.interval_secs));
    loop {
        interval.tick().await;
        match sweep_once(&pool, settings.grace_period_secs).await {
            Ok(n) if n > 0 => tracing::warn!(count = n, "swept stale pending operations to failed"),
            Ok(_) => tracing::debug!("sweeper ran, nothing stale"),
            Err(error) => tracing::error!(?error, "sweeper pass failed"),
        }
    }
}

async fn sweep_once(pool: &PgPool, grace_period_secs: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query!(
        r#"
        UPDATE write_operations
        SET status = 'failed',
            error = 'stale pending operation, promoted by sweeper',
            completed_at = now()
        WHERE status = 'pending'
          AND created_at < now() - make_interval(secs => $1)
        "#,
        grace_period_secs as f64,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
