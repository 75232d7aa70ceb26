//! Traits and data structures for the versioned secret store.
//!
//! The store owns every stage label. The rotation controller reads fresh
//! metadata on each invocation and never caches it.
//!
//! 中文: 版本化密钥存储的 Trait 与数据结构。存储拥有所有阶段标签，控制器每次调用都重新读取。

#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Stage label held by exactly one version: the live credential.
pub const AWSCURRENT: &str = "AWSCURRENT";
/// Stage label held by at most one version: the credential being rotated in.
pub const AWSPENDING: &str = "AWSPENDING";
/// Stage label some stores attach to the version that was current before the last rotation.
pub const AWSPREVIOUS: &str = "AWSPREVIOUS";

/// Errors reported by a secret store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("secret not found: {0}")]
    ResourceNotFound(String),

    #[error("no version of secret {secret_id} carries stage {stage}{}", version_suffix(.version_id))]
    VersionNotFound {
        secret_id: String,
        stage: String,
        version_id: Option<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("secret store service error: {0}")]
    Service(String),
}

fn version_suffix(version_id: &Option<String>) -> String {
    version_id
        .as_deref()
        .map(|v| format!(" with version id {v}"))
        .unwrap_or_default()
}

/// Rotation metadata for one secret, as returned by `describe_secret`.
///
/// 中文: `describe_secret` 返回的单个密钥的轮换元数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMetadata {
    pub secret_id: String,
    pub rotation_enabled: bool,
    /// Version id to the stage labels attached to it.
    pub version_ids_to_stages: BTreeMap<String, BTreeSet<String>>,
    /// Set when the secret is scheduled for deletion.
    pub deleted_date: Option<DateTime<Utc>>,
}

impl SecretMetadata {
    /// Returns the stage labels attached to `version_id`, if the version is known.
    pub fn stages_of(&self, version_id: &str) -> Option<&BTreeSet<String>> {
        self.version_ids_to_stages.get(version_id)
    }

    /// Returns the version id that carries `stage`, if any.
    pub fn version_with_stage(&self, stage: &str) -> Option<&str> {
        self.version_ids_to_stages
            .iter()
            .find(|(_, stages)| stages.contains(stage))
            .map(|(version, _)| version.as_str())
    }
}

/// One secret version's value.
#[derive(Debug)]
pub struct SecretValue {
    pub version_id: String,
    pub secret_string: SecretString,
    pub version_stages: BTreeSet<String>,
}

/// Confirmation that a secret has been scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReceipt {
    pub secret_id: String,
    /// The secret can be restored until this instant.
    pub deletion_date: DateTime<Utc>,
}

/// Defines the operations the rotation controller consumes from a secret store.
///
/// Not-found is an explicit `Ok(None)` from `get_secret_value`, so callers can
/// branch on it without inspecting errors.
///
/// 中文: 定义了轮换控制器所使用的密钥存储操作。“未找到”通过 `Ok(None)` 显式表示。
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches rotation metadata for a secret.
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, StoreError>;

    /// Fetches the value of the version carrying `stage`.
    ///
    /// When `version_id` is given, the version must also match it. Returns
    /// `Ok(None)` when no such version holds a value.
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: &str,
        version_id: Option<&str>,
    ) -> Result<Option<SecretValue>, StoreError>;

    /// Stores `secret_string` as version `version_id`, attaching `stages`.
    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: SecretString,
        stages: &[&str],
    ) -> Result<(), StoreError>;

    /// Atomically attaches `stage` to `move_to_version` and removes it from
    /// `remove_from_version`. No observer may see the label on zero or two versions.
    async fn update_version_stage(
        &self,
        secret_id: &str,
        stage: &str,
        move_to_version: &str,
        remove_from_version: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Generates a random password that contains none of `exclude_characters`.
    async fn get_random_password(&self, exclude_characters: &str)
    -> Result<SecretString, StoreError>;

    /// Schedules the secret for deletion after `recovery_window_days`.
    async fn delete_secret(
        &self,
        secret_id: &str,
        recovery_window_days: u32,
    ) -> Result<DeletionReceipt, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> SecretMetadata {
        let mut versions = BTreeMap::new();
        versions.insert("v1".to_string(), BTreeSet::from([AWSCURRENT.to_string()]));
        versions.insert("v2".to_string(), BTreeSet::from([AWSPENDING.to_string()]));
        SecretMetadata {
            secret_id: "s".into(),
            rotation_enabled: true,
            version_ids_to_stages: versions,
            deleted_date: None,
        }
    }

    #[test]
    fn finds_version_by_stage() {
        let meta = metadata();
        assert_eq!(meta.version_with_stage(AWSCURRENT), Some("v1"));
        assert_eq!(meta.version_with_stage(AWSPENDING), Some("v2"));
        assert_eq!(meta.version_with_stage(AWSPREVIOUS), None);
        assert!(meta.stages_of("v3").is_none());
    }

    #[test]
    fn version_not_found_message_names_version() {
        let err = StoreError::VersionNotFound {
            secret_id: "s".into(),
            stage: AWSPENDING.into(),
            version_id: Some("v9".into()),
        };
        assert_eq!(
            err.to_string(),
            "no version of secret s carries stage AWSPENDING with version id v9"
        );
    }
}
