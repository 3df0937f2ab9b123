//! Read-through cache of user documents, stored as one Redis hash per user
//! under `user:<hex id>`.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use mongodb::bson::{DateTime, oid::ObjectId};
use redis::{AsyncCommands, aio::ConnectionManager};

use super::{bounded, ping};
use crate::config::RedisConfig;
use crate::db_mongo::models::User;

#[derive(Clone)]
pub struct UserCache {
    conn: ConnectionManager,
    ttl: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl UserCache {
    pub fn new(conn: ConnectionManager, cfg: &RedisConfig) -> Self {
        Self {
            conn,
            ttl: cfg.cache_ttl,
            read_timeout: cfg.read_timeout,
            write_timeout: cfg.write_timeout,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        ping(&mut conn, self.read_timeout).await
    }

    /// Write every user in one MULTI/EXEC block.
    pub async fn store_users(&self, users: &[User]) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }

        let ttl_secs = self.ttl.as_secs() as i64;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for user in users {
            let key = user_key(&user.id);
            pipe.del(&key).ignore();
            pipe.hset_multiple(&key, &user_fields(user)).ignore();
            pipe.expire(&key, ttl_secs).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = bounded(self.write_timeout, pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    /// `None` on a miss or an incomplete hash.
    pub async fn get_user(&self, id: ObjectId) -> Result<Option<User>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            bounded(self.read_timeout, conn.hgetall(user_key(&id))).await?;
        Ok(user_from_fields(id, &fields))
    }

    pub async fn evict(&self, id: ObjectId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = bounded(self.write_timeout, conn.del(user_key(&id))).await?;
        Ok(())
    }
}

pub fn user_key(id: &ObjectId) -> String {
    format!("user:{}", id.to_hex())
}

/// Timestamps are stored as unix seconds, friends as a JSON array of hex ids.
pub fn user_fields(user: &User) -> Vec<(&'static str, String)> {
    let friends: Vec<String> = user.friends_list.iter().map(|id| id.to_hex()).collect();
    vec![
        ("email", user.email.clone()),
        ("first_name", user.first_name.clone()),
        ("last_name", user.last_name.clone()),
        ("created_at", (user.created_at.timestamp_millis() / 1000).to_string()),
        ("updated_at", (user.updated_at.timestamp_millis() / 1000).to_string()),
        (
            "friends",
            serde_json::to_string(&friends).unwrap_or_else(|_| "[]".to_string()),
        ),
    ]
}

pub fn user_from_fields(id: ObjectId, fields: &HashMap<String, String>) -> Option<User> {
    let timestamp = |name: &str| {
        fields
            .get(name)?
            .parse::<i64>()
            .ok()
            .map(|secs| DateTime::from_millis(secs * 1000))
    };

    let friends_list = fields
        .get("friends")
        .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
        .unwrap_or_default()
        .iter()
        .filter_map(|hex| ObjectId::parse_str(hex).ok())
        .collect();

    Some(User {
        id,
        email: fields.get("email")?.clone(),
        first_name: fields.get("first_name")?.clone(),
        last_name: fields.get("last_name")?.clone(),
        friends_list,
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}
