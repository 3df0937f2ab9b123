pub mod cache;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use redis::{IntoConnectionInfo, RedisResult, aio::ConnectionManager};

use crate::config::RedisConfig;

pub use cache::UserCache;

/// Create Redis connection
pub async fn create_client(cfg: &RedisConfig) -> Result<ConnectionManager> {
    let mut info = format!("redis://{}/{}", cfg.addr, cfg.db)
        .into_connection_info()
        .with_context(|| format!("Invalid Redis address {}", cfg.addr))?;
    info.redis.password = cfg.password.clone();

    let client = redis::Client::open(info).context("Failed to build Redis client")?;
    let mut conn = bounded(cfg.dial_timeout, client.get_connection_manager())
        .await
        .context("Failed to connect to Redis")?;

    ping(&mut conn, cfg.read_timeout)
        .await
        .context("Failed to ping Redis")?;

    tracing::info!(addr = %cfg.addr, db = cfg.db, "Successfully connected to Redis");
    Ok(conn)
}

pub async fn ping(conn: &mut ConnectionManager, limit: Duration) -> Result<()> {
    let reply: String = bounded(limit, redis::cmd("PING").query_async(conn)).await?;
    if reply != "PONG" {
        anyhow::bail!("unexpected PING reply {:?}", reply);
    }
    Ok(())
}

/// Run a Redis call, failing once `limit` elapses.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = RedisResult<T>>,
{
    let reply = tokio::time::timeout(limit, call)
        .await
        .with_context(|| format!("Redis call timed out after {:?}", limit))??;
    Ok(reply)
}
