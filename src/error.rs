//! Defines the custom error type for the `rotation-kit` crate.

use crate::cluster::ClusterError;
use crate::store::StoreError;
use thiserror::Error;

/// The main error type for the `rotation-kit` crate.
///
/// Every variant is fatal for the step that raised it. The trigger that invoked
/// the step owns retry scheduling.
#[derive(Debug, Error)]
pub enum Error {
    /// Secret not enabled for rotation, token unknown, or token not staged as pending.
    #[error("not eligible for rotation: {0}")]
    NotEligible(String),

    #[error("invalid step parameter: {0}")]
    InvalidStep(String),

    #[error("{field} key is missing from secret JSON")]
    MalformedSecret { field: &'static str },

    #[error("secret {secret_id} has no AWSCURRENT version")]
    MissingCurrent { secret_id: String },

    /// The pending credential could not open a session on the cluster.
    #[error("pending credential for user '{login}' was rejected by the cluster")]
    CredentialValidationFailed {
        login: String,
        #[source]
        source: ClusterError,
    },

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("secret store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("deserialization failed: {0}")]
    Deserialize(serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl Error {
    /// Returns the cluster failure classification carried by this error, if any.
    ///
    /// 中文: 如果错误来自集群连接，返回其分类。
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            Error::Cluster(e) | Error::CredentialValidationFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }
}
