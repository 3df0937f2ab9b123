use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub friends_list: Vec<ObjectId>,
    pub created_at: mongodb::bson::DateTime,
    pub updated_at: mongodb::bson::DateTime,
}

/// Caller-supplied fields of a user about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    pub fn new(input: NewUser, now: mongodb::bson::DateTime) -> Self {
        Self {
            id: ObjectId::new(),
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            friends_list: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
