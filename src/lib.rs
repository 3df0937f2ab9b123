pub mod app;
pub mod auth;
pub mod config;
pub mod db_mongo;
pub mod db_redis;
pub mod health;
pub mod replset;
pub mod users;

/// Install the global `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
