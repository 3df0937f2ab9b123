//! Single-node replica set bootstrap.
//!
//! Issues `replSetInitiate` once and then polls `replSetGetStatus` on a fixed
//! interval until the node reports itself as `PRIMARY`, giving up after a
//! fixed number of attempts.

pub mod admin;
pub mod types;

use std::time::Duration;

use thiserror::Error;

use crate::config::BootstrapConfig;

pub use admin::{ALREADY_INITIALIZED, InitiateOutcome, ReplicaSetAdmin};
pub use types::{MemberConfig, MemberStatus, ReplicaSetConfig, ReplicaSetStatus};

#[derive(Debug, Error)]
pub enum ReplSetError {
    #[error("invalid replica set config: {0}")]
    InvalidConfig(String),

    #[error("{command} rejected by server (code {code}): {message}")]
    Rejected {
        command: &'static str,
        code: i32,
        message: String,
    },

    #[error("{command} failed: {source}")]
    Driver {
        command: &'static str,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("failed to encode replica set config: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("failed to decode replica set status: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    #[error("node did not become PRIMARY after {attempts} status checks")]
    NotPrimary { attempts: u32 },
}

impl ReplSetError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// How long to wait for the node to be elected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl From<&BootstrapConfig> for WaitPolicy {
    fn from(cfg: &BootstrapConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            poll_interval: cfg.poll_interval,
        }
    }
}

impl From<&BootstrapConfig> for ReplicaSetConfig {
    fn from(cfg: &BootstrapConfig) -> Self {
        ReplicaSetConfig::single_node(cfg.set_name.clone(), cfg.member_host.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub initiate: InitiateOutcome,
    /// Status checks performed, including the successful one.
    pub attempts: u32,
    /// Name of the member that reported `PRIMARY`.
    pub primary: String,
}

/// Initiate `config` and wait until its first member is `PRIMARY`.
///
/// A failed initiate is logged rather than returned: if another process
/// configured the set concurrently the node still converges, and if nothing
/// did, polling ends with [`ReplSetError::NotPrimary`].
pub async fn initiate_and_wait<A>(
    admin: &A,
    config: &ReplicaSetConfig,
    policy: &WaitPolicy,
) -> Result<BootstrapReport, ReplSetError>
where
    A: ReplicaSetAdmin,
{
    config.validate()?;

    let initiate = match admin.initiate(config).await {
        Ok(outcome) => {
            match outcome {
                InitiateOutcome::Initiated => {
                    tracing::info!(set = %config.id, members = config.members.len(), "Replica set initiated")
                }
                InitiateOutcome::AlreadyInitialized => {
                    tracing::info!(set = %config.id, "Replica set already initialized")
                }
                InitiateOutcome::Failed => {
                    tracing::warn!(set = %config.id, "replSetInitiate failed, waiting for PRIMARY anyway")
                }
            }
            outcome
        }
        Err(e) => {
            tracing::warn!(set = %config.id, error = %e, "replSetInitiate failed, waiting for PRIMARY anyway");
            InitiateOutcome::Failed
        }
    };

    for attempt in 1..=policy.max_attempts {
        match admin.status().await {
            Ok(status) if status.is_primary() => {
                let primary = status
                    .first_member()
                    .map(|m| m.name.clone())
                    .unwrap_or_default();
                tracing::info!(set = %config.id, primary = %primary, attempt, "Node is PRIMARY");
                return Ok(BootstrapReport {
                    initiate,
                    attempts: attempt,
                    primary,
                });
            }
            Ok(status) => {
                let state = status
                    .first_member()
                    .map(|m| m.state_str.as_str())
                    .unwrap_or("<no members>");
                tracing::debug!(attempt, ok = status.ok, state, "Waiting for PRIMARY");
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "replSetGetStatus not ready");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    tracing::error!(set = %config.id, attempts = policy.max_attempts, "Node never became PRIMARY");
    Err(ReplSetError::NotPrimary {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted admin: returns queued status replies in order, then a
    /// not-yet-initialized rejection once the queue runs dry.
    struct FakeAdmin {
        initiate_result: Mutex<Option<Result<InitiateOutcome, ReplSetError>>>,
        statuses: Mutex<VecDeque<Result<ReplicaSetStatus, ReplSetError>>>,
        initiate_calls: AtomicU32,
        status_calls: AtomicU32,
    }

    impl FakeAdmin {
        fn new(
            initiate: Result<InitiateOutcome, ReplSetError>,
            statuses: Vec<Result<ReplicaSetStatus, ReplSetError>>,
        ) -> Self {
            Self {
                initiate_result: Mutex::new(Some(initiate)),
                statuses: Mutex::new(statuses.into()),
                initiate_calls: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
            }
        }
    }

    impl ReplicaSetAdmin for FakeAdmin {
        async fn initiate(&self, _config: &ReplicaSetConfig) -> Result<InitiateOutcome, ReplSetError> {
            self.initiate_calls.fetch_add(1, Ordering::SeqCst);
            self.initiate_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(InitiateOutcome::AlreadyInitialized))
        }

        async fn status(&self) -> Result<ReplicaSetStatus, ReplSetError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(not_yet_initialized()))
        }
    }

    fn not_yet_initialized() -> ReplSetError {
        ReplSetError::Rejected {
            command: "replSetGetStatus",
            code: 94,
            message: "no replset config has been received".to_string(),
        }
    }

    fn member_in(state: &str) -> ReplicaSetStatus {
        ReplicaSetStatus {
            ok: 1.0,
            set: Some("rs0".to_string()),
            members: Some(vec![MemberStatus {
                id: 0,
                name: "localhost:27017".to_string(),
                state: if state == "PRIMARY" { 1 } else { 2 },
                state_str: state.to_string(),
                health: 1.0,
            }]),
        }
    }

    fn fast_policy(max_attempts: u32) -> WaitPolicy {
        WaitPolicy {
            max_attempts,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn rs0() -> ReplicaSetConfig {
        ReplicaSetConfig::single_node("rs0", "localhost:27017")
    }

    #[tokio::test]
    async fn test_primary_on_first_check() {
        let admin = FakeAdmin::new(Ok(InitiateOutcome::Initiated), vec![Ok(member_in("PRIMARY"))]);

        let report = initiate_and_wait(&admin, &rs0(), &fast_policy(30)).await.unwrap();

        assert_eq!(report.initiate, InitiateOutcome::Initiated);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.primary, "localhost:27017");
        assert_eq!(admin.initiate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(admin.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waits_through_election() {
        let admin = FakeAdmin::new(
            Ok(InitiateOutcome::Initiated),
            vec![
                Err(not_yet_initialized()),
                Ok(ReplicaSetStatus { ok: 1.0, set: None, members: None }),
                Ok(member_in("STARTUP2")),
                Ok(member_in("SECONDARY")),
                Ok(member_in("PRIMARY")),
            ],
        );

        let report = initiate_and_wait(&admin, &rs0(), &fast_policy(30)).await.unwrap();

        assert_eq!(report.attempts, 5);
        assert_eq!(admin.status_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_already_initialized_set() {
        let admin = FakeAdmin::new(
            Ok(InitiateOutcome::AlreadyInitialized),
            vec![Ok(member_in("PRIMARY"))],
        );

        let report = initiate_and_wait(&admin, &rs0(), &fast_policy(3)).await.unwrap();

        assert_eq!(report.initiate, InitiateOutcome::AlreadyInitialized);
    }

    #[tokio::test]
    async fn test_initiate_failure_still_polls() {
        let admin = FakeAdmin::new(
            Err(ReplSetError::Rejected {
                command: "replSetInitiate",
                code: 93,
                message: "InvalidReplicaSetConfig".to_string(),
            }),
            vec![Ok(member_in("SECONDARY")), Ok(member_in("PRIMARY"))],
        );

        let report = initiate_and_wait(&admin, &rs0(), &fast_policy(5)).await.unwrap();

        assert_eq!(report.initiate, InitiateOutcome::Failed);
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let statuses = (0..10).map(|_| Ok(member_in("SECONDARY"))).collect();
        let admin = FakeAdmin::new(Ok(InitiateOutcome::Initiated), statuses);

        let err = initiate_and_wait(&admin, &rs0(), &fast_policy(4)).await.unwrap_err();

        assert!(matches!(err, ReplSetError::NotPrimary { attempts: 4 }));
        assert_eq!(admin.status_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_fails_after_initiate() {
        let admin = FakeAdmin::new(Ok(InitiateOutcome::Initiated), vec![Ok(member_in("PRIMARY"))]);

        let err = initiate_and_wait(&admin, &rs0(), &fast_policy(0)).await.unwrap_err();

        assert!(matches!(err, ReplSetError::NotPrimary { attempts: 0 }));
        assert_eq!(admin.initiate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(admin.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_skips_server() {
        let admin = FakeAdmin::new(Ok(InitiateOutcome::Initiated), vec![]);
        let config = ReplicaSetConfig::single_node("", "localhost:27017");

        let err = initiate_and_wait(&admin, &config, &fast_policy(3)).await.unwrap_err();

        assert!(matches!(err, ReplSetError::InvalidConfig(_)));
        assert_eq!(admin.initiate_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_from_bootstrap_config() {
        let cfg = BootstrapConfig {
            enabled: true,
            set_name: "rs9".to_string(),
            member_host: "mongo:27017".to_string(),
            max_attempts: 7,
            poll_interval: Duration::from_millis(500),
        };
        let policy = WaitPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.poll_interval, Duration::from_millis(500));
        assert_eq!(ReplicaSetConfig::from(&cfg), ReplicaSetConfig::single_node("rs9", "mongo:27017"));
        assert_eq!(WaitPolicy::default().max_attempts, 30);
    }
}
