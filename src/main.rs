use anyhow::{Context, Result};

use rs_init::{
    config::AppConfig,
    db_mongo,
    replset::{self, ReplicaSetConfig, WaitPolicy},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    rs_init::init_tracing();

    let cfg = AppConfig::from_env();
    let set = ReplicaSetConfig::from(&cfg.bootstrap);
    let policy = WaitPolicy::from(&cfg.bootstrap);

    tracing::info!(
        set = %set.id,
        host = %cfg.bootstrap.member_host,
        max_attempts = policy.max_attempts,
        poll_interval_ms = policy.poll_interval.as_millis() as u64,
        "Bootstrapping single-node replica set"
    );

    let client = db_mongo::create_client(&cfg.mongo, true).await?;
    let report = replset::initiate_and_wait(&client, &set, &policy)
        .await
        .context("Replica set bootstrap failed")?;

    tracing::info!(
        primary = %report.primary,
        attempts = report.attempts,
        outcome = ?report.initiate,
        "Replica set ready"
    );

    client.shutdown().await;
    Ok(())
}
