use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};

use super::ReplSetError;

pub const PRIMARY_STATE: &str = "PRIMARY";

/// Argument of `replSetInitiate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSetConfig {
    #[serde(rename = "_id")]
    pub id: String,
    pub members: Vec<MemberConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    #[serde(rename = "_id")]
    pub id: i32,
    pub host: String,
}

impl ReplicaSetConfig {
    /// A set with exactly one member, `_id` 0.
    pub fn single_node(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            members: vec![MemberConfig {
                id: 0,
                host: host.into(),
            }],
        }
    }

    pub fn validate(&self) -> Result<(), ReplSetError> {
        if self.id.trim().is_empty() {
            return Err(ReplSetError::invalid_config("replica set name is empty"));
        }
        if self.members.is_empty() {
            return Err(ReplSetError::invalid_config("replica set has no members"));
        }
        for (idx, member) in self.members.iter().enumerate() {
            if member.host.trim().is_empty() {
                return Err(ReplSetError::invalid_config(format!(
                    "member {} has an empty host",
                    member.id
                )));
            }
            if self.members[..idx].iter().any(|m| m.id == member.id) {
                return Err(ReplSetError::invalid_config(format!(
                    "duplicate member id {}",
                    member.id
                )));
            }
        }
        Ok(())
    }

    pub fn to_document(&self) -> Result<Document, ReplSetError> {
        Ok(bson::to_document(self)?)
    }
}

/// The subset of the `replSetGetStatus` reply that bootstrap cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplicaSetStatus {
    #[serde(default)]
    pub ok: f64,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub members: Option<Vec<MemberStatus>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberStatus {
    #[serde(rename = "_id", default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: i32,
    #[serde(rename = "stateStr", default)]
    pub state_str: String,
    #[serde(default)]
    pub health: f64,
}

impl ReplicaSetStatus {
    pub fn from_document(doc: Document) -> Result<Self, ReplSetError> {
        Ok(bson::from_document(doc)?)
    }

    /// The node counts as ready once the command succeeded and the first
    /// listed member reports `PRIMARY`.
    pub fn is_primary(&self) -> bool {
        self.ok == 1.0 && self.first_member().is_some_and(|m| m.state_str == PRIMARY_STATE)
    }

    pub fn first_member(&self) -> Option<&MemberStatus> {
        self.members.as_ref().and_then(|members| members.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_single_node_document() {
        let config = ReplicaSetConfig::single_node("rs0", "localhost:27017");
        let doc = config.to_document().unwrap();
        assert_eq!(
            doc,
            doc! { "_id": "rs0", "members": [{ "_id": 0, "host": "localhost:27017" }] }
        );
    }

    #[test]
    fn test_validate() {
        assert!(ReplicaSetConfig::single_node("rs0", "localhost:27017").validate().is_ok());
        assert!(ReplicaSetConfig::single_node("", "localhost:27017").validate().is_err());
        assert!(ReplicaSetConfig::single_node("rs0", " ").validate().is_err());

        let empty = ReplicaSetConfig { id: "rs0".into(), members: vec![] };
        assert!(empty.validate().is_err());

        let duplicated = ReplicaSetConfig {
            id: "rs0".into(),
            members: vec![
                MemberConfig { id: 0, host: "a:27017".into() },
                MemberConfig { id: 0, host: "b:27017".into() },
            ],
        };
        assert!(matches!(duplicated.validate(), Err(ReplSetError::InvalidConfig(_))));
    }

    #[test]
    fn test_primary_status() {
        let status = ReplicaSetStatus::from_document(doc! {
            "set": "rs0",
            "myState": 1,
            "ok": 1.0,
            "members": [{
                "_id": 0,
                "name": "localhost:27017",
                "health": 1.0,
                "state": 1,
                "stateStr": "PRIMARY",
                "uptime": 12,
            }],
        })
        .unwrap();
        assert!(status.is_primary());
        assert_eq!(status.set.as_deref(), Some("rs0"));
        assert_eq!(status.first_member().unwrap().name, "localhost:27017");
    }

    #[test]
    fn test_integer_ok_is_accepted() {
        let status = ReplicaSetStatus::from_document(doc! {
            "ok": 1,
            "members": [{ "_id": 0, "name": "localhost:27017", "stateStr": "PRIMARY" }],
        })
        .unwrap();
        assert!(status.is_primary());
    }

    #[test]
    fn test_not_primary() {
        let secondary = ReplicaSetStatus::from_document(doc! {
            "ok": 1.0,
            "members": [{ "_id": 0, "name": "localhost:27017", "stateStr": "SECONDARY" }],
        })
        .unwrap();
        assert!(!secondary.is_primary());

        let failed = ReplicaSetStatus::from_document(doc! {
            "ok": 0.0,
            "members": [{ "_id": 0, "name": "localhost:27017", "stateStr": "PRIMARY" }],
        })
        .unwrap();
        assert!(!failed.is_primary());

        let no_members = ReplicaSetStatus::from_document(doc! { "ok": 1.0 }).unwrap();
        assert!(!no_members.is_primary());

        let empty_members =
            ReplicaSetStatus::from_document(doc! { "ok": 1.0, "members": [] }).unwrap();
        assert!(!empty_members.is_primary());
    }
}
