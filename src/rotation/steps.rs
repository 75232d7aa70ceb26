//! The four step handlers.
// 中文: 四个步骤的处理函数。所有失败都立即向触发器传播，不在进程内重试。

use super::RotationController;
use crate::cluster::connect_to_cluster;
use crate::error::Error;
use crate::store::{AWSCURRENT, AWSPENDING};
use tracing::{error, info};

impl RotationController {
    /// Stages a new credential as AWSPENDING under `token`.
    ///
    /// A no-op when a pending value already exists for `token`.
    pub(super) async fn create_secret(&self, secret_id: &str, token: &str) -> Result<(), Error> {
        // 当前版本必须存在
        let current = self.fetch_credential_dict(secret_id, AWSCURRENT, None).await?;
        info!(
            secret_id,
            cluster = %current.endpoint,
            user = %current.login,
            "starting cluster password and secret rotation"
        );

        if self
            .try_fetch_credential_dict(secret_id, AWSPENDING, Some(token))
            .await?
            .is_some()
        {
            info!(secret_id, token, "pending secret already exists");
            return Ok(());
        }

        let password = self
            .store
            .get_random_password(&self.config.exclude_characters)
            .await?;
        let pending = current.with_password(password);
        self.store
            .put_secret_value(secret_id, token, pending.to_secret_string()?, &[AWSPENDING])
            .await?;
        info!(secret_id, token, "successfully put pending secret");
        Ok(())
    }

    /// Changes the cluster password from the current value to the pending one,
    /// authenticating with the current credential.
    pub(super) async fn set_secret(&self, secret_id: &str, token: &str) -> Result<(), Error> {
        let pending = self.fetch_credential_dict(secret_id, AWSPENDING, Some(token)).await?;
        let current = self.fetch_credential_dict(secret_id, AWSCURRENT, None).await?;

        info!(
            user = %current.login,
            cluster = %current.endpoint,
            "updating cluster password"
        );
        let session = connect_to_cluster(
            self.cluster.as_ref(),
            &current.endpoint,
            &current.login,
            &current.password,
            &self.config.cluster,
        )
        .await?;

        session
            .change_password(&current.password, &pending.password)
            .await
            .inspect_err(|e| {
                error!(user = %current.login, kind = e.kind(), error = %e, "password update failed")
            })?;
        info!(user = %current.login, "password updated");
        Ok(())
    }

    /// Proves the pending credential opens a session on the cluster.
    pub(super) async fn test_secret(&self, secret_id: &str, token: &str) -> Result<(), Error> {
        let pending = self.fetch_credential_dict(secret_id, AWSPENDING, Some(token)).await?;

        match connect_to_cluster(
            self.cluster.as_ref(),
            &pending.endpoint,
            &pending.login,
            &pending.password,
            &self.config.cluster,
        )
        .await
        {
            Ok(_) => {
                info!(user = %pending.login, "pending credential verified");
                Ok(())
            }
            Err(source) => {
                error!(
                    severity = "CRITICAL",
                    user = %pending.login,
                    kind = source.kind(),
                    "failed to update the cluster credentials and secret"
                );
                Err(Error::CredentialValidationFailed {
                    login: pending.login,
                    source,
                })
            }
        }
    }

    /// Moves AWSCURRENT onto `token`'s version in one store call.
    ///
    /// A no-op when `token` already holds AWSCURRENT.
    pub(super) async fn finish_secret(&self, secret_id: &str, token: &str) -> Result<(), Error> {
        let metadata = self.store.describe_secret(secret_id).await?;
        let current_version = metadata.version_with_stage(AWSCURRENT);
        if current_version == Some(token) {
            info!(secret_id, version = token, "version already marked as AWSCURRENT");
            return Ok(());
        }

        self.store
            .update_version_stage(secret_id, AWSCURRENT, token, current_version)
            .await?;

        let current = self.fetch_credential_dict(secret_id, AWSCURRENT, None).await?;
        info!(
            secret_id,
            user = %current.login,
            "successfully updated the cluster credentials and secret"
        );
        Ok(())
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::cluster::memory::InMemoryCluster;
    use crate::config::RotationConfig;
    use crate::store::SecretStore;
    use crate::store::memory::InMemorySecretStore;
    use std::sync::Arc;

    const PAYLOAD: &str = r#"{"endpoint":"a.example.com","login":"svc","password":"p1"}"#;

    #[tokio::test]
    async fn finish_on_current_version_leaves_store_untouched() -> Result<(), Error> {
        let store = Arc::new(InMemorySecretStore::new());
        let current = store.create_secret("db", PAYLOAD)?;
        store.start_rotation("db")?;
        let controller = RotationController::new(
            store.clone(),
            Arc::new(InMemoryCluster::new("a.example.com")),
            RotationConfig::default(),
        );

        let writes = store.write_count();
        controller.finish_secret("db", &current).await?;

        assert_eq!(store.write_count(), writes);
        let meta = store.describe_secret("db").await?;
        assert_eq!(meta.version_with_stage(AWSCURRENT), Some(current.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn finish_moves_current_label_in_one_write() -> Result<(), Error> {
        let store = Arc::new(InMemorySecretStore::new());
        let previous = store.create_secret("db", PAYLOAD)?;
        let token = store.start_rotation("db")?;
        store
            .put_secret_value("db", &token, PAYLOAD.to_string().into(), &[AWSPENDING])
            .await?;
        let controller = RotationController::new(
            store.clone(),
            Arc::new(InMemoryCluster::new("a.example.com")),
            RotationConfig::default(),
        );

        let writes = store.write_count();
        controller.finish_secret("db", &token).await?;

        assert_eq!(store.write_count(), writes + 1);
        let meta = store.describe_secret("db").await?;
        assert_eq!(meta.version_with_stage(AWSCURRENT), Some(token.as_str()));
        assert!(meta.stages_of(&previous).is_none());
        Ok(())
    }
}
