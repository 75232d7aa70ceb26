//! In-memory implementation of `SecretStore`.
// 中文: `SecretStore` 的内存实现。

use super::{
    AWSCURRENT, AWSPENDING, DeletionReceipt, SecretMetadata, SecretStore, SecretValue, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand_core::{OsRng, TryRngCore};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;
use zeroize::Zeroizing;

const DEFAULT_PASSWORD_LENGTH: usize = 32;
const MIN_RECOVERY_WINDOW_DAYS: u32 = 7;
const MAX_RECOVERY_WINDOW_DAYS: u32 = 30;

struct StoredVersion {
    /// `None` for a version that was staged before any value was put.
    secret_string: Option<SecretString>,
    stages: BTreeSet<String>,
    created_at: DateTime<Utc>,
}

struct SecretRecord {
    rotation_enabled: bool,
    versions: BTreeMap<String, StoredVersion>,
    deleted_date: Option<DateTime<Utc>>,
}

impl SecretRecord {
    fn ensure_active(&self, secret_id: &str) -> Result<(), StoreError> {
        match self.deleted_date {
            Some(date) => Err(StoreError::InvalidRequest(format!(
                "secret {secret_id} is scheduled for deletion on {}",
                date.to_rfc3339()
            ))),
            None => Ok(()),
        }
    }

    /// 将阶段标签从其他所有版本上移除，再附加到目标版本。
    fn attach_exclusive(&mut self, version_id: &str, stage: &str) {
        for (id, version) in self.versions.iter_mut() {
            if id != version_id {
                version.stages.remove(stage);
            }
        }
        if let Some(version) = self.versions.get_mut(version_id) {
            version.stages.insert(stage.to_string());
        }
    }
}

/// A secret store held entirely in memory.
///
/// Stage labels are unique per secret: attaching a label to one version removes
/// it from every other version. `update_version_stage` runs under the secret's
/// shard lock, so the label move is atomic with respect to every other call.
///
/// 中文: 完全保存在内存中的密钥存储。阶段标签在每个密钥内唯一，标签移动在分片锁下原子完成。
pub struct InMemorySecretStore {
    secrets: DashMap<String, SecretRecord>,
    password_length: usize,
    writes: AtomicUsize,
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self {
            secrets: DashMap::new(),
            password_length: DEFAULT_PASSWORD_LENGTH,
            writes: AtomicUsize::new(0),
        }
    }

    /// Sets the length of passwords returned by `get_random_password`.
    pub fn with_password_length(mut self, length: usize) -> Self {
        self.password_length = length;
        self
    }

    /// Creates a secret whose first version carries AWSCURRENT. Rotation starts disabled.
    ///
    /// Returns the id of the new version.
    pub fn create_secret(
        &self,
        secret_id: &str,
        secret_string: impl Into<String>,
    ) -> Result<String, StoreError> {
        if self.secrets.contains_key(secret_id) {
            return Err(StoreError::InvalidRequest(format!(
                "secret {secret_id} already exists"
            )));
        }
        let version_id = Uuid::new_v4().to_string();
        let mut versions = BTreeMap::new();
        versions.insert(
            version_id.clone(),
            StoredVersion {
                secret_string: Some(SecretString::from(secret_string.into())),
                stages: BTreeSet::from([AWSCURRENT.to_string()]),
                created_at: Utc::now(),
            },
        );
        self.secrets.insert(
            secret_id.to_string(),
            SecretRecord {
                rotation_enabled: false,
                versions,
                deleted_date: None,
            },
        );
        Ok(version_id)
    }

    pub fn set_rotation_enabled(&self, secret_id: &str, enabled: bool) -> Result<(), StoreError> {
        let mut record = self.record_mut(secret_id)?;
        record.rotation_enabled = enabled;
        Ok(())
    }

    /// Begins a rotation the way the store's scheduler does: enables rotation,
    /// stages a new empty version as AWSPENDING and returns its id (the request token).
    pub fn start_rotation(&self, secret_id: &str) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        let mut record = self.record_mut(secret_id)?;
        record.ensure_active(secret_id)?;
        record.rotation_enabled = true;
        record.versions.insert(
            token.clone(),
            StoredVersion {
                secret_string: None,
                stages: BTreeSet::new(),
                created_at: Utc::now(),
            },
        );
        record.attach_exclusive(&token, AWSPENDING);
        Ok(token)
    }

    /// Cancels a scheduled deletion.
    pub fn restore_secret(&self, secret_id: &str) -> Result<(), StoreError> {
        let mut record = self.record_mut(secret_id)?;
        record.deleted_date = None;
        Ok(())
    }

    /// Number of versions, staged or not, that hold a value.
    pub fn version_count(&self, secret_id: &str) -> usize {
        self.secrets
            .get(secret_id)
            .map(|r| {
                r.versions
                    .values()
                    .filter(|v| v.secret_string.is_some())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Number of successful mutating calls made through the `SecretStore` trait.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Creation time of a version, if it exists.
    pub fn version_created_at(&self, secret_id: &str, version_id: &str) -> Option<DateTime<Utc>> {
        self.secrets
            .get(secret_id)
            .and_then(|r| r.versions.get(version_id).map(|v| v.created_at))
    }

    fn record_mut(
        &self,
        secret_id: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, SecretRecord>, StoreError> {
        self.secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::ResourceNotFound(secret_id.to_string()))
    }

    fn record_written(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, StoreError> {
        let record = self
            .secrets
            .get(secret_id)
            .ok_or_else(|| StoreError::ResourceNotFound(secret_id.to_string()))?;

        // 没有任何标签的版本视为已废弃，不出现在映射中
        let version_ids_to_stages = record
            .versions
            .iter()
            .filter(|(_, v)| !v.stages.is_empty())
            .map(|(id, v)| (id.clone(), v.stages.clone()))
            .collect();

        Ok(SecretMetadata {
            secret_id: secret_id.to_string(),
            rotation_enabled: record.rotation_enabled,
            version_ids_to_stages,
            deleted_date: record.deleted_date,
        })
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: &str,
        version_id: Option<&str>,
    ) -> Result<Option<SecretValue>, StoreError> {
        let record = self
            .secrets
            .get(secret_id)
            .ok_or_else(|| StoreError::ResourceNotFound(secret_id.to_string()))?;
        record.ensure_active(secret_id)?;

        let found = record.versions.iter().find(|(id, v)| {
            v.stages.contains(stage) && version_id.is_none_or(|wanted| wanted == id.as_str())
        });

        Ok(found.and_then(|(id, v)| {
            v.secret_string.as_ref().map(|s| SecretValue {
                version_id: id.clone(),
                secret_string: SecretString::from(s.expose_secret().to_string()),
                version_stages: v.stages.clone(),
            })
        }))
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: SecretString,
        stages: &[&str],
    ) -> Result<(), StoreError> {
        let mut record = self.record_mut(secret_id)?;
        record.ensure_active(secret_id)?;

        match record.versions.get_mut(version_id) {
            Some(existing) => {
                let conflicting = existing
                    .secret_string
                    .as_ref()
                    .is_some_and(|stored| stored.expose_secret() != secret_string.expose_secret());
                if conflicting {
                    return Err(StoreError::InvalidRequest(format!(
                        "version {version_id} of secret {secret_id} already exists with different content"
                    )));
                }
                if existing.secret_string.is_none() {
                    existing.secret_string = Some(secret_string);
                }
            }
            None => {
                record.versions.insert(
                    version_id.to_string(),
                    StoredVersion {
                        secret_string: Some(secret_string),
                        stages: BTreeSet::new(),
                        created_at: Utc::now(),
                    },
                );
            }
        }

        let stages: &[&str] = if stages.is_empty() { &[AWSCURRENT] } else { stages };
        for stage in stages {
            record.attach_exclusive(version_id, stage);
        }
        self.record_written();
        Ok(())
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        stage: &str,
        move_to_version: &str,
        remove_from_version: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut record = self.record_mut(secret_id)?;
        record.ensure_active(secret_id)?;

        if !record.versions.contains_key(move_to_version) {
            return Err(StoreError::InvalidParameter(format!(
                "version {move_to_version} does not exist for secret {secret_id}"
            )));
        }

        let holder = record
            .versions
            .iter()
            .find(|(_, v)| v.stages.contains(stage))
            .map(|(id, _)| id.clone());

        // 标签已附加在其他版本上时，必须显式指定从哪个版本移除
        if let Some(holder) = holder.as_deref() {
            if holder != move_to_version && Some(holder) != remove_from_version {
                return Err(StoreError::InvalidParameter(format!(
                    "stage {stage} is attached to version {holder}; it must be named as the version to remove from"
                )));
            }
        }

        if let Some(from) = remove_from_version {
            if let Some(version) = record.versions.get_mut(from) {
                version.stages.remove(stage);
            }
        }
        if let Some(version) = record.versions.get_mut(move_to_version) {
            version.stages.insert(stage.to_string());
        }
        self.record_written();
        Ok(())
    }

    async fn get_random_password(
        &self,
        exclude_characters: &str,
    ) -> Result<SecretString, StoreError> {
        let alphabet: Vec<u8> = (b'!'..=b'~')
            .filter(|b| !exclude_characters.contains(char::from(*b)))
            .collect();
        if alphabet.is_empty() {
            return Err(StoreError::InvalidParameter(
                "exclude characters leave no characters to build a password from".to_string(),
            ));
        }
        if self.password_length == 0 {
            return Err(StoreError::InvalidParameter(
                "password length must be positive".to_string(),
            ));
        }

        // 拒绝采样，避免取模偏差
        let limit = (256 / alphabet.len()) * alphabet.len();
        // 任何返回路径上都会清零
        let mut password = Zeroizing::new(String::with_capacity(self.password_length));
        let mut buf = Zeroizing::new([0u8; 64]);
        while password.len() < self.password_length {
            OsRng
                .try_fill_bytes(&mut buf[..])
                .map_err(|e| StoreError::Service(format!("random source failed: {e}")))?;
            for &byte in buf.iter() {
                if password.len() == self.password_length {
                    break;
                }
                if (byte as usize) < limit {
                    password.push(char::from(alphabet[byte as usize % alphabet.len()]));
                }
            }
        }
        Ok(SecretString::from(std::mem::take(&mut *password)))
    }

    async fn delete_secret(
        &self,
        secret_id: &str,
        recovery_window_days: u32,
    ) -> Result<DeletionReceipt, StoreError> {
        if !(MIN_RECOVERY_WINDOW_DAYS..=MAX_RECOVERY_WINDOW_DAYS).contains(&recovery_window_days) {
            return Err(StoreError::InvalidParameter(format!(
                "recovery window must be between {MIN_RECOVERY_WINDOW_DAYS} and {MAX_RECOVERY_WINDOW_DAYS} days, got {recovery_window_days}"
            )));
        }
        let mut record = self.record_mut(secret_id)?;
        record.ensure_active(secret_id)?;

        let deletion_date = Utc::now() + Duration::days(i64::from(recovery_window_days));
        record.deleted_date = Some(deletion_date);
        self.record_written();
        Ok(DeletionReceipt {
            secret_id: secret_id.to_string(),
            deletion_date,
        })
    }
}
