//! 轮换控制器：校验请求令牌的阶段标签，并分发到对应的步骤。
use crate::cluster::ClusterAuth;
use crate::config::RotationConfig;
use crate::contract::{RotationRequest, RotationStep};
use crate::credential::CredentialDict;
use crate::error::Error;
use crate::store::{AWSCURRENT, AWSPENDING, DeletionReceipt, SecretMetadata, SecretStore, StoreError};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info};

/// 令牌所在版本的状态
#[derive(Debug, PartialEq, Eq)]
enum Eligibility {
    /// 令牌版本已经是 AWSCURRENT，本次调用无需任何操作
    AlreadyCurrent,
    /// 令牌版本处于 AWSPENDING，可以继续分发
    Pending,
}

/// `RotationController` 驱动一个密钥的四步轮换。
///
/// 它不持有任何跨调用的状态：每次 `handle` 都会重新读取密钥元数据。
/// 密钥存储与集群认证端点在构造时显式注入。
#[derive(Clone)]
pub struct RotationController {
    pub(super) store: Arc<dyn SecretStore>,
    pub(super) cluster: Arc<dyn ClusterAuth>,
    pub(super) config: RotationConfig,
}

impl RotationController {
    /// 创建一个新的轮换控制器。
    pub fn new(
        store: Arc<dyn SecretStore>,
        cluster: Arc<dyn ClusterAuth>,
        config: RotationConfig,
    ) -> Self {
        Self {
            store,
            cluster,
            config,
        }
    }

    /// 返回控制器的配置。
    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// 处理一次轮换请求。
    ///
    /// 校验顺序：
    /// 1. 密钥必须启用轮换且未被计划删除；
    /// 2. 令牌必须出现在版本映射中；
    /// 3. 令牌版本已是 AWSCURRENT 时直接成功返回；
    /// 4. 否则令牌版本必须带有 AWSPENDING。
    pub async fn handle(&self, request: &RotationRequest) -> Result<(), Error> {
        let secret_id = request.secret_id.as_str();
        let token = request.token.as_str();
        info!(secret_id, token, step = %request.step, "rotation step requested");

        let metadata = self.store.describe_secret(secret_id).await?;
        if check_eligibility(&metadata, token)? == Eligibility::AlreadyCurrent {
            info!(secret_id, token, "secret version already set as AWSCURRENT");
            return Ok(());
        }

        match request.step {
            RotationStep::CreateSecret => self.create_secret(secret_id, token).await,
            RotationStep::SetSecret => self.set_secret(secret_id, token).await,
            RotationStep::TestSecret => self.test_secret(secret_id, token).await,
            RotationStep::FinishSecret => self.finish_secret(secret_id, token).await,
        }
    }

    /// 读取指定阶段（可选地固定到某个版本）的凭据并校验必需字段。
    ///
    /// AWSCURRENT 缺失时返回 `Error::MissingCurrent`，其他阶段缺失时返回
    /// `StoreError::VersionNotFound`。
    pub async fn fetch_credential_dict(
        &self,
        secret_id: &str,
        stage: &str,
        token: Option<&str>,
    ) -> Result<CredentialDict, Error> {
        match self.try_fetch_credential_dict(secret_id, stage, token).await? {
            Some(dict) => Ok(dict),
            None if stage == AWSCURRENT => Err(Error::MissingCurrent {
                secret_id: secret_id.to_string(),
            }),
            None => Err(StoreError::VersionNotFound {
                secret_id: secret_id.to_string(),
                stage: stage.to_string(),
                version_id: token.map(str::to_string),
            }
            .into()),
        }
    }

    /// 与 `fetch_credential_dict` 相同，但版本不存在时返回 `Ok(None)`。
    pub async fn try_fetch_credential_dict(
        &self,
        secret_id: &str,
        stage: &str,
        token: Option<&str>,
    ) -> Result<Option<CredentialDict>, Error> {
        let Some(value) = self.store.get_secret_value(secret_id, stage, token).await? else {
            return Ok(None);
        };
        let dict = CredentialDict::from_secret_string(value.secret_string.expose_secret())?;
        Ok(Some(dict))
    }

    /// 计划删除整个密钥，恢复窗口取自配置。
    pub async fn schedule_deletion(&self, secret_id: &str) -> Result<DeletionReceipt, Error> {
        info!(secret_id, "deleting the secret");
        let receipt = self
            .store
            .delete_secret(secret_id, self.config.recovery_window_days)
            .await?;
        info!(
            secret_id,
            recovery_window_days = self.config.recovery_window_days,
            deletion_date = %receipt.deletion_date.to_rfc3339(),
            "secret scheduled for deletion; it can be restored until the deletion date"
        );
        Ok(receipt)
    }
}

/// 校验令牌所在版本是否可以执行轮换步骤。
fn check_eligibility(metadata: &SecretMetadata, token: &str) -> Result<Eligibility, Error> {
    let secret_id = metadata.secret_id.as_str();
    let reject = |reason: String| -> Result<Eligibility, Error> {
        error!(secret_id, token, "{reason}");
        Err(Error::NotEligible(reason))
    };

    if !metadata.rotation_enabled {
        return reject(format!("secret {secret_id} is not enabled for rotation"));
    }
    if metadata.deleted_date.is_some() {
        return reject(format!("secret {secret_id} is scheduled for deletion"));
    }
    let Some(stages) = metadata.stages_of(token) else {
        return reject(format!(
            "secret version {token} has no stage for rotation of secret {secret_id}"
        ));
    };
    if stages.contains(AWSCURRENT) {
        return Ok(Eligibility::AlreadyCurrent);
    }
    if !stages.contains(AWSPENDING) {
        return reject(format!(
            "secret version {token} not set as AWSPENDING for rotation of secret {secret_id}"
        ));
    }
    Ok(Eligibility::Pending)
}
