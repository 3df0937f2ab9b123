pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Database};

use crate::config::MongoConfig;

/// Create MongoDB connection.
///
/// `direct` connects to the single host in the URI without replica set
/// discovery, which is the only way to reach a member before the set exists.
pub async fn create_client(cfg: &MongoConfig, direct: bool) -> Result<Client> {
    let options = client_options(cfg, direct).await?;
    let client = Client::with_options(options).context("Failed to build MongoDB client")?;

    // Ping to verify connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1})
        .await
        .context("Failed to ping MongoDB")?;

    tracing::info!(direct, "Successfully connected to MongoDB");
    Ok(client)
}

pub async fn client_options(cfg: &MongoConfig, direct: bool) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(&cfg.uri)
        .await
        .with_context(|| format!("Invalid MongoDB URI {}", redact(&cfg.uri)))?;

    options.connect_timeout = Some(cfg.connect_timeout);
    options.server_selection_timeout = Some(cfg.connect_timeout);

    if cfg.username.is_some() || cfg.password.is_some() {
        let mut credential = Credential::default();
        credential.username = cfg.username.clone();
        credential.password = cfg.password.clone();
        credential.source = cfg.auth_source.clone();
        options.credential = Some(credential);
    }

    if direct {
        options.direct_connection = Some(true);
        options.repl_set_name = None;
    }

    Ok(options)
}

/// Get database handle
pub fn get_database(client: &Client, db_name: &str) -> Database {
    client.database(db_name)
}

fn redact(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &uri[..scheme_end], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mongo_config(uri: &str) -> MongoConfig {
        MongoConfig {
            uri: uri.to_string(),
            database: "app".to_string(),
            connect_timeout: Duration::from_secs(3),
            username: None,
            password: None,
            auth_source: None,
            use_transactions: true,
        }
    }

    #[tokio::test]
    async fn test_direct_options_drop_set_name() {
        let cfg = mongo_config("mongodb://localhost:27017/?replicaSet=rs0");

        let direct = client_options(&cfg, true).await.unwrap();
        assert_eq!(direct.direct_connection, Some(true));
        assert!(direct.repl_set_name.is_none());
        assert_eq!(direct.connect_timeout, Some(Duration::from_secs(3)));

        let discovered = client_options(&cfg, false).await.unwrap();
        assert_eq!(discovered.repl_set_name.as_deref(), Some("rs0"));
        assert!(discovered.credential.is_none());
    }

    #[tokio::test]
    async fn test_credentials_applied() {
        let mut cfg = mongo_config("mongodb://localhost:27017");
        cfg.username = Some("root".to_string());
        cfg.password = Some("secret".to_string());
        cfg.auth_source = Some("admin".to_string());

        let options = client_options(&cfg, false).await.unwrap();
        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("root"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("mongodb://user:pw@host:27017"), "mongodb://***@host:27017");
        assert_eq!(redact("mongodb://host:27017"), "mongodb://host:27017");
    }
}
