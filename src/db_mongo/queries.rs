use anyhow::{Context, Result};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{doc, oid::ObjectId},
    options::ReturnDocument,
};
use super::models::*;
use crate::db_redis::UserCache;

pub const USERS: &str = "users";

fn users(db: &Database) -> Collection<User> {
    db.collection::<User>(USERS)
}

/// Insert all users and return their ids in input order.
///
/// With `transactional` set the whole batch commits or nothing does, which
/// requires the server to be a replica set member. Committed users are then
/// mirrored into `cache`.
pub async fn bulk_insert_users(
    client: &Client,
    db: &Database,
    cache: Option<&UserCache>,
    input: Vec<NewUser>,
    transactional: bool,
) -> Result<Vec<ObjectId>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let now = mongodb::bson::DateTime::now();
    let docs: Vec<User> = input.into_iter().map(|u| User::new(u, now)).collect();
    let ids: Vec<ObjectId> = docs.iter().map(|u| u.id).collect();
    let collection = users(db);

    if !transactional {
        collection.insert_many(&docs).await?;
        mirror(cache, &docs).await;
        return Ok(ids);
    }

    let mut session = client.start_session().await?;
    session.start_transaction().await?;

    if let Err(e) = collection.insert_many(&docs).session(&mut session).await {
        if let Err(abort_err) = session.abort_transaction().await {
            tracing::warn!(error = %abort_err, "Failed to abort bulk insert transaction");
        }
        return Err(e).context("Bulk insert failed, transaction aborted");
    }

    session
        .commit_transaction()
        .await
        .context("Failed to commit bulk insert")?;

    tracing::info!(count = ids.len(), "Inserted users");
    mirror(cache, &docs).await;
    Ok(ids)
}

/// Cache first, then MongoDB; a database hit refills the cache.
pub async fn get_user_by_id(
    db: &Database,
    cache: Option<&UserCache>,
    user_id: ObjectId,
) -> Result<Option<User>> {
    if let Some(cache) = cache {
        match cache.get_user(user_id).await {
            Ok(Some(user)) => return Ok(Some(user)),
            Ok(None) => {}
            Err(e) => tracing::warn!(user = %user_id, "User cache read failed: {:#}", e),
        }
    }

    let user = users(db).find_one(doc! { "_id": user_id }).await?;
    if let Some(user) = &user {
        mirror(cache, std::slice::from_ref(user)).await;
    }
    Ok(user)
}

/// Returns whether a user matched.
pub async fn update_user_email(
    db: &Database,
    cache: Option<&UserCache>,
    user_id: ObjectId,
    email: &str,
) -> Result<bool> {
    let result = users(db)
        .update_one(
            doc! { "_id": user_id },
            doc! {
                "$set": {
                    "email": email,
                    "updated_at": mongodb::bson::DateTime::now(),
                }
            },
        )
        .await?;

    let matched = result.matched_count > 0;
    if matched {
        evict(cache, user_id).await;
    }
    Ok(matched)
}

/// Returns whether a user was deleted.
pub async fn delete_user(
    db: &Database,
    cache: Option<&UserCache>,
    user_id: ObjectId,
) -> Result<bool> {
    let result = users(db).delete_one(doc! { "_id": user_id }).await?;
    let deleted = result.deleted_count > 0;
    if deleted {
        evict(cache, user_id).await;
    }
    Ok(deleted)
}

/// Add `friend_id` to the user's friends without duplicating it.
pub async fn add_friend(
    db: &Database,
    cache: Option<&UserCache>,
    user_id: ObjectId,
    friend_id: ObjectId,
) -> Result<Option<User>> {
    let user = users(db)
        .find_one_and_update(
            doc! { "_id": user_id },
            doc! {
                "$addToSet": { "friends_list": friend_id },
                "$set": { "updated_at": mongodb::bson::DateTime::now() },
            },
        )
        .return_document(ReturnDocument::After)
        .await?;

    if let Some(user) = &user {
        mirror(cache, std::slice::from_ref(user)).await;
    }
    Ok(user)
}

pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let index = IndexModel::builder().keys(doc! { "email": 1 }).build();
    users(db)
        .create_index(index)
        .await
        .context("Failed to create users email index")?;
    Ok(())
}

pub async fn list_collection_names(db: &Database) -> Result<Vec<String>> {
    let names = db.list_collection_names().await?;
    Ok(names)
}

// MongoDB is the source of truth, so cache failures after a successful write
// are logged and the stale entry expires with its TTL.
async fn mirror(cache: Option<&UserCache>, docs: &[User]) {
    if let Some(cache) = cache {
        if let Err(e) = cache.store_users(docs).await {
            tracing::warn!(count = docs.len(), "User cache write failed: {:#}", e);
        }
    }
}

async fn evict(cache: Option<&UserCache>, user_id: ObjectId) {
    if let Some(cache) = cache {
        if let Err(e) = cache.evict(user_id).await {
            tracing::warn!(user = %user_id, "User cache eviction failed: {:#}", e);
        }
    }
}
