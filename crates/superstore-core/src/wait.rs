use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::{info, warn};

use crate::config::{EtlConfig, WaitPolicy};
use crate::db;
use crate::error::{EtlError, Result};

/// Polls the administrative database until a connection succeeds.
///
/// With the default policy this never gives up: a host that never comes up
/// blocks the run forever. Set `max_attempts` to bound it.
pub async fn wait_for_database(config: &EtlConfig) -> Result<u32> {
    let options = db::connect_options(config, &config.admin_database);
    let options = &options;
    wait_with(config.wait, move || async move {
        let conn = PgConnection::connect_with(options).await?;
        conn.close().await
    })
    .await
}

/// Retries `probe` on `policy` until it succeeds; returns the number of
/// attempts that were needed.
pub async fn wait_with<P, Fut>(policy: WaitPolicy, mut probe: P) -> Result<u32>
where
    P: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<(), sqlx::Error>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match probe().await {
            Ok(()) => {
                info!(attempts, "Database is ready");
                return Ok(attempts);
            }
            Err(err) => {
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(EtlError::WaitExhausted {
                        attempts,
                        source: err,
                    });
                }
                warn!(
                    attempts,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    "Waiting for database: {err}"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn policy(max_attempts: Option<u32>) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn returns_after_first_successful_probe() {
        let mut calls = 0;
        let attempts = wait_with(policy(None), || {
            calls += 1;
            let ready = calls >= 3;
            async move {
                if ready {
                    Ok(())
                } else {
                    Err(sqlx::Error::PoolTimedOut)
                }
            }
        })
        .await
        .expect("probe eventually succeeds");

        assert_eq!(attempts, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn bounded_policy_gives_up() {
        let mut calls = 0;
        let err = wait_with(policy(Some(4)), || {
            calls += 1;
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, EtlError::WaitExhausted { attempts: 4, .. }));
        assert_eq!(calls, 4);
    }
}
