//! The cluster authentication endpoint consumed by the rotation steps.
//!
//! 中文: 轮换步骤所使用的集群认证端点。

#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Classification of a failed cluster call.
///
/// 中文: 集群调用失败的分类。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The cluster rejected the login/password pair.
    #[error("authentication failed for user '{login}': {reason}")]
    AuthenticationFailed { login: String, reason: String },

    /// The credentials are valid but lack permission for the operation.
    #[error("user '{login}' is not authorized: {reason}")]
    AuthorizationFailed { login: String, reason: String },

    /// The endpoint could not be reached, or did not answer in time.
    #[error("connection to '{endpoint}' failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
}

impl ClusterError {
    /// A short, stable name for the classification, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::AuthenticationFailed { .. } => "AuthenticationFailed",
            ClusterError::AuthorizationFailed { .. } => "AuthorizationFailed",
            ClusterError::ConnectionFailed { .. } => "ConnectionFailed",
        }
    }
}

/// How to reach the cluster.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionOptions {
    pub port: u16,
    pub use_tls: bool,
    pub verify_certs: bool,
    /// Upper bound for establishing an authenticated session.
    pub timeout_secs: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            port: 443,
            use_tls: true,
            verify_certs: true,
            timeout_secs: 60,
        }
    }
}

impl ConnectionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// An authenticated session on the cluster, bound to the login that opened it.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// The login this session authenticated as.
    fn login(&self) -> &str;

    /// Changes the session user's password from `current_password` to `new_password`.
    ///
    /// The change is atomic on the cluster: it either takes effect entirely or not at all.
    async fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), ClusterError>;
}

/// Factory for authenticated cluster sessions.
///
/// 中文: 集群会话工厂。实现者负责传输细节，这里只约定认证结果的分类。
#[async_trait]
pub trait ClusterAuth: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        login: &str,
        password: &SecretString,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn ClusterSession>, ClusterError>;
}

/// Opens a session on the cluster, enforcing `options.timeout()`.
///
/// Every failure is logged and returned as a `ClusterError` classification;
/// the caller decides whether it is fatal.
///
/// 中文: 打开集群会话并强制超时。所有失败都会被记录并以分类形式返回，由调用者决定如何处理。
pub async fn connect_to_cluster(
    auth: &dyn ClusterAuth,
    endpoint: &str,
    login: &str,
    password: &SecretString,
    options: &ConnectionOptions,
) -> Result<Box<dyn ClusterSession>, ClusterError> {
    info!(endpoint, login, port = options.port, "connecting to cluster endpoint");

    let attempt = auth.connect(endpoint, login, password, options);
    let result = match tokio::time::timeout(options.timeout(), attempt).await {
        Ok(result) => result,
        Err(_) => Err(ClusterError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: format!("no response within {}s", options.timeout_secs),
        }),
    };

    match &result {
        Ok(_) => info!(endpoint, login, "connected"),
        Err(e) => error!(endpoint, login, kind = e.kind(), error = %e, "cluster connection failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_tls_on_443() {
        let options = ConnectionOptions::default();
        assert_eq!(options.port, 443);
        assert!(options.use_tls && options.verify_certs);
        assert_eq!(options.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn kinds_are_stable() {
        let err = ClusterError::AuthorizationFailed {
            login: "svc".into(),
            reason: "forbidden".into(),
        };
        assert_eq!(err.kind(), "AuthorizationFailed");
        assert_eq!(err.to_string(), "user 'svc' is not authorized: forbidden");
    }
}
