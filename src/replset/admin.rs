use mongodb::Client;
use mongodb::bson::doc;
use mongodb::error::{Error as DriverError, ErrorKind};

use super::{ReplSetError, ReplicaSetConfig, ReplicaSetStatus};

/// Server error code returned by `replSetInitiate` on an already configured set.
pub const ALREADY_INITIALIZED: i32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiateOutcome {
    Initiated,
    AlreadyInitialized,
    /// The command was rejected; bootstrap still waits in case another
    /// process configured the set.
    Failed,
}

/// The two administrative commands bootstrap needs.
#[allow(async_fn_in_trait)]
pub trait ReplicaSetAdmin {
    async fn initiate(&self, config: &ReplicaSetConfig) -> Result<InitiateOutcome, ReplSetError>;

    async fn status(&self) -> Result<ReplicaSetStatus, ReplSetError>;
}

impl ReplicaSetAdmin for Client {
    async fn initiate(&self, config: &ReplicaSetConfig) -> Result<InitiateOutcome, ReplSetError> {
        let command = doc! { "replSetInitiate": config.to_document()? };
        match self.database("admin").run_command(command).await {
            Ok(_) => Ok(InitiateOutcome::Initiated),
            Err(err) => initiate_outcome(driver_error("replSetInitiate", err)),
        }
    }

    async fn status(&self) -> Result<ReplicaSetStatus, ReplSetError> {
        let reply = self
            .database("admin")
            .run_command(doc! { "replSetGetStatus": 1 })
            .await
            .map_err(|err| driver_error("replSetGetStatus", err))?;
        ReplicaSetStatus::from_document(reply)
    }
}

/// An already configured set is success; every other failure stays an error.
fn initiate_outcome(err: ReplSetError) -> Result<InitiateOutcome, ReplSetError> {
    match err {
        ReplSetError::Rejected { code, .. } if code == ALREADY_INITIALIZED => {
            Ok(InitiateOutcome::AlreadyInitialized)
        }
        other => Err(other),
    }
}

/// Server-side command failures keep their code; everything else stays a
/// driver error.
fn driver_error(command: &'static str, err: DriverError) -> ReplSetError {
    if let ErrorKind::Command(ref failure) = *err.kind {
        return ReplSetError::Rejected {
            command,
            code: failure.code,
            message: failure.message.clone(),
        };
    }
    ReplSetError::Driver {
        command,
        source: err,
    }
}
