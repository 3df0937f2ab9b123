use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    /// `None` when `REDIS_ADDR` is unset; the service then runs without a cache.
    pub redis: Option<RedisConfig>,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Zero disables the request timeout layer.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub connect_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_source: Option<String>,
    pub use_transactions: bool,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `host:port`
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub cache_ttl: Duration,
}

/// Replica set bootstrap settings shared by `rs-init` and the server.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Only consulted by the server; `rs-init` always bootstraps.
    pub enabled: bool,
    pub set_name: String,
    pub member_host: String,
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server = ServerConfig {
            host: text("SERVER_HOST", "127.0.0.1"),
            port: positive_or(parse_or(lookup("SERVER_PORT"), 3000), 3000),
            request_timeout_secs: parse_or(lookup("REQUEST_TIMEOUT_SECS"), 0),
        };

        let connect_timeout_secs: u64 = parse_or(lookup("MONGO_CONNECT_TIMEOUT_SECS"), 10);
        let mongo = MongoConfig {
            uri: text("MONGO_URI", "mongodb://localhost:27017"),
            database: text("MONGO_DATABASE", "app"),
            connect_timeout: Duration::from_secs(positive_or(connect_timeout_secs, 10)),
            username: optional("MONGO_USERNAME"),
            password: optional("MONGO_PASSWORD"),
            auth_source: optional("MONGO_AUTH_SOURCE"),
            use_transactions: parse_flag(lookup("MONGO_USE_TRANSACTIONS"), true),
        };

        let redis = optional("REDIS_ADDR").map(|addr| {
            let secs = |key: &str, default: u64| {
                Duration::from_secs(positive_or(parse_or(lookup(key), default), default))
            };
            RedisConfig {
                addr: addr.trim().to_string(),
                password: optional("REDIS_PASSWORD"),
                db: parse_or(lookup("REDIS_DB"), 0),
                dial_timeout: secs("REDIS_DIAL_TIMEOUT_SECS", 5),
                read_timeout: secs("REDIS_READ_TIMEOUT_SECS", 3),
                write_timeout: secs("REDIS_WRITE_TIMEOUT_SECS", 3),
                cache_ttl: secs("REDIS_CACHE_TTL_SECS", 24 * 60 * 60),
            }
        });

        let poll_interval_ms: u64 = parse_or(lookup("REPLSET_POLL_INTERVAL_MS"), 1000);
        let bootstrap = BootstrapConfig {
            enabled: parse_flag(lookup("REPLSET_BOOTSTRAP"), false),
            set_name: text("REPLSET_NAME", "rs0"),
            member_host: text("REPLSET_MEMBER_HOST", "localhost:27017"),
            max_attempts: positive_or(parse_or(lookup("REPLSET_MAX_ATTEMPTS"), 30), 30),
            poll_interval: Duration::from_millis(positive_or(poll_interval_ms, 1000)),
        };

        Self {
            server,
            mongo,
            redis,
            bootstrap,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn positive_or<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
