use anyhow::{Context, Result};
use tokio::net::TcpListener;

use rs_init::{
    app::{self, AppState},
    config::AppConfig,
    db_mongo::{self, queries},
    db_redis::{self, UserCache},
    replset::{self, ReplicaSetConfig, WaitPolicy},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    rs_init::init_tracing();

    let cfg = AppConfig::from_env();

    if cfg.bootstrap.enabled {
        let bootstrap_client = db_mongo::create_client(&cfg.mongo, true).await?;
        replset::initiate_and_wait(
            &bootstrap_client,
            &ReplicaSetConfig::from(&cfg.bootstrap),
            &WaitPolicy::from(&cfg.bootstrap),
        )
        .await
        .context("Replica set bootstrap failed")?;
        bootstrap_client.shutdown().await;
    }

    let client = db_mongo::create_client(&cfg.mongo, false).await?;
    let db = db_mongo::get_database(&client, &cfg.mongo.database);

    if let Err(e) = queries::ensure_indexes(&db).await {
        tracing::warn!("Index setup skipped: {:#}", e);
    }

    let cache = match &cfg.redis {
        Some(redis_cfg) => {
            let conn = db_redis::create_client(redis_cfg).await?;
            Some(UserCache::new(conn, redis_cfg))
        }
        None => {
            tracing::info!("REDIS_ADDR not set, running without user cache");
            None
        }
    };

    let state = AppState {
        client: client.clone(),
        db,
        cache,
        use_transactions: cfg.mongo.use_transactions,
    };
    let app = app::router(state, cfg.server.request_timeout_secs);

    let listener = TcpListener::bind(cfg.server.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind_addr()))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    client.shutdown().await;
    tracing::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
