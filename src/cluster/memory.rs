//! In-memory cluster used to exercise the rotation protocol without a network.
// 中文: 内存中的集群，用于在无网络的情况下演练轮换协议。

use super::{ClusterAuth, ClusterError, ClusterSession, ConnectionOptions};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A password change the cluster accepted.
///
/// Passwords are kept in the clear so tests can assert on them; this type
/// belongs to the test double only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub login: String,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Default)]
struct ClusterState {
    endpoint: String,
    users: DashMap<String, String>,
    forbidden: DashSet<String>,
    unreachable: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    next_change_failure: Mutex<Option<ClusterError>>,
    changes: Mutex<Vec<PasswordChange>>,
    connect_attempts: AtomicUsize,
}

/// A cluster holding a user → password table for a single endpoint.
///
/// Cloning yields another handle to the same cluster.
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<ClusterState>,
}

impl InMemoryCluster {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ClusterState {
                endpoint: endpoint.into(),
                ..Default::default()
            }),
        }
    }

    pub fn add_user(&self, login: impl Into<String>, password: impl Into<String>) {
        self.state.users.insert(login.into(), password.into());
    }

    /// Users marked forbidden authenticate but fail with `AuthorizationFailed`.
    pub fn forbid(&self, login: impl Into<String>) {
        self.state.forbidden.insert(login.into());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delays every connection attempt, to exercise connect timeouts.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *lock(&self.state.connect_delay) = delay;
    }

    /// Makes the next `change_password` call fail with `error`.
    pub fn fail_next_change(&self, error: ClusterError) {
        *lock(&self.state.next_change_failure) = Some(error);
    }

    pub fn password_of(&self, login: &str) -> Option<String> {
        self.state.users.get(login).map(|p| p.value().clone())
    }

    pub fn password_changes(&self) -> Vec<PasswordChange> {
        lock(&self.state.changes).clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ClusterAuth for InMemoryCluster {
    async fn connect(
        &self,
        endpoint: &str,
        login: &str,
        password: &SecretString,
        _options: &ConnectionOptions,
    ) -> Result<Box<dyn ClusterSession>, ClusterError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.state.connect_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.unreachable.load(Ordering::SeqCst) || endpoint != self.state.endpoint {
            return Err(ClusterError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: "host unreachable".to_string(),
            });
        }

        let authenticated = self
            .state
            .users
            .get(login)
            .is_some_and(|stored| stored.as_str() == password.expose_secret());
        if !authenticated {
            return Err(ClusterError::AuthenticationFailed {
                login: login.to_string(),
                reason: "invalid username or password".to_string(),
            });
        }
        if self.state.forbidden.contains(login) {
            return Err(ClusterError::AuthorizationFailed {
                login: login.to_string(),
                reason: "no permissions for cluster access".to_string(),
            });
        }

        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
            login: login.to_string(),
        }))
    }
}

struct InMemorySession {
    state: Arc<ClusterState>,
    login: String,
}

#[async_trait]
impl ClusterSession for InMemorySession {
    fn login(&self) -> &str {
        &self.login
    }

    async fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), ClusterError> {
        if let Some(error) = lock(&self.state.next_change_failure).take() {
            return Err(error);
        }

        let mut stored = self.state.users.get_mut(&self.login).ok_or_else(|| {
            ClusterError::AuthenticationFailed {
                login: self.login.clone(),
                reason: "user no longer exists".to_string(),
            }
        })?;
        if stored.as_str() != current_password.expose_secret() {
            return Err(ClusterError::AuthenticationFailed {
                login: self.login.clone(),
                reason: "current password does not match".to_string(),
            });
        }
        *stored = new_password.expose_secret().to_string();
        drop(stored);

        lock(&self.state.changes).push(PasswordChange {
            login: self.login.clone(),
            current_password: current_password.expose_secret().to_string(),
            new_password: new_password.expose_secret().to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn connect_classifies_failures() {
        let cluster = InMemoryCluster::new("a.example.com");
        cluster.add_user("svc", "p1");
        cluster.add_user("reader", "r1");
        cluster.forbid("reader");
        let options = ConnectionOptions::default();

        let err = cluster
            .connect("a.example.com", "svc", &secret("wrong"), &options)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "AuthenticationFailed");

        let err = cluster
            .connect("a.example.com", "reader", &secret("r1"), &options)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "AuthorizationFailed");

        let err = cluster
            .connect("b.example.com", "svc", &secret("p1"), &options)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ConnectionFailed");

        assert_eq!(cluster.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn change_password_requires_current_password() -> Result<(), ClusterError> {
        let cluster = InMemoryCluster::new("a.example.com");
        cluster.add_user("svc", "p1");
        let session = cluster
            .connect("a.example.com", "svc", &secret("p1"), &ConnectionOptions::default())
            .await?;
        assert_eq!(session.login(), "svc");

        let err = session
            .change_password(&secret("nope"), &secret("p2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "AuthenticationFailed");

        session.change_password(&secret("p1"), &secret("p2")).await?;
        assert_eq!(cluster.password_of("svc").as_deref(), Some("p2"));
        assert_eq!(
            cluster.password_changes(),
            vec![PasswordChange {
                login: "svc".into(),
                current_password: "p1".into(),
                new_password: "p2".into(),
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn injected_change_failure_fires_once() -> Result<(), ClusterError> {
        let cluster = InMemoryCluster::new("a.example.com");
        cluster.add_user("svc", "p1");
        cluster.fail_next_change(ClusterError::ConnectionFailed {
            endpoint: "a.example.com".into(),
            reason: "reset".into(),
        });
        let session = cluster
            .connect("a.example.com", "svc", &secret("p1"), &ConnectionOptions::default())
            .await?;

        assert!(session.change_password(&secret("p1"), &secret("p2")).await.is_err());
        assert_eq!(cluster.password_of("svc").as_deref(), Some("p1"));
        session.change_password(&secret("p1"), &secret("p2")).await?;
        Ok(())
    }
}
