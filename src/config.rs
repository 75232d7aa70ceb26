//!
//! # 配置模块
//!
//! 轮换处理器的运行配置，从进程环境变量中读取，缺省值与托管轮换函数一致。
//!
//! `EXCLUDE_CHARACTERS` 按原样读取，不做任何类型推断；其余选项只从带
//! `ROTATION_` 前缀的变量中读取，进程环境中的其他变量一律忽略。
//!
//! | 环境变量 | 字段 | 缺省值 |
//! |---|---|---|
//! | `EXCLUDE_CHARACTERS` | `exclude_characters` | `/@"'\` |
//! | `ROTATION_RECOVERY_WINDOW_DAYS` | `recovery_window_days` | `30` |
//! | `ROTATION_CLUSTER__PORT` | `cluster.port` | `443` |
//! | `ROTATION_CLUSTER__USE_TLS` | `cluster.use_tls` | `true` |
//! | `ROTATION_CLUSTER__VERIFY_CERTS` | `cluster.verify_certs` | `true` |
//! | `ROTATION_CLUSTER__TIMEOUT_SECS` | `cluster.timeout_secs` | `60` |
//!
use crate::cluster::ConnectionOptions;
use crate::error::Error;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

/// 排除字符的环境变量名
pub const EXCLUDE_CHARACTERS_VAR: &str = "EXCLUDE_CHARACTERS";

/// 其余选项的环境变量前缀
pub const ENV_PREFIX: &str = "ROTATION";

/// Characters never used in generated passwords unless overridden.
pub const DEFAULT_EXCLUDE_CHARACTERS: &str = "/@\"'\\";

/// 删除密钥时的缺省恢复窗口（天）
pub const DEFAULT_RECOVERY_WINDOW_DAYS: u32 = 30;

/// 轮换处理器配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RotationConfig {
    /// 生成密码时排除的字符
    #[serde(default = "default_exclude_characters")]
    pub exclude_characters: String,
    /// 集群连接选项
    #[serde(default)]
    pub cluster: ConnectionOptions,
    /// 计划删除密钥时的恢复窗口（天）
    #[serde(default = "default_recovery_window_days")]
    pub recovery_window_days: u32,
}

fn default_exclude_characters() -> String {
    DEFAULT_EXCLUDE_CHARACTERS.to_string()
}

fn default_recovery_window_days() -> u32 {
    DEFAULT_RECOVERY_WINDOW_DAYS
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            exclude_characters: default_exclude_characters(),
            cluster: ConnectionOptions::default(),
            recovery_window_days: DEFAULT_RECOVERY_WINDOW_DAYS,
        }
    }
}

impl RotationConfig {
    /// 从进程环境变量加载配置。
    ///
    /// 值不是合法 UTF-8 的变量会被跳过。
    pub fn from_env() -> Result<Self, Error> {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::from_vars(vars)
    }

    /// 从给定的变量表加载配置，不读取进程环境。
    pub fn from_vars(vars: config::Map<String, String>) -> Result<Self, Error> {
        let exclude_characters = vars.get(EXCLUDE_CHARACTERS_VAR).cloned();
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(Some(vars));

        let settings = Config::builder()
            .add_source(environment)
            .set_override_option("exclude_characters", exclude_characters)?
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        let mut map = config::Map::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn empty_environment_yields_defaults() -> Result<(), Error> {
        let config = RotationConfig::from_vars(vars(&[]))?;
        assert_eq!(config, RotationConfig::default());
        assert_eq!(config.exclude_characters, "/@\"'\\");
        Ok(())
    }

    #[test]
    fn variables_override_defaults() -> Result<(), Error> {
        let config = RotationConfig::from_vars(vars(&[
            ("EXCLUDE_CHARACTERS", "%&"),
            ("ROTATION_CLUSTER__PORT", "9200"),
            ("ROTATION_CLUSTER__VERIFY_CERTS", "false"),
            ("ROTATION_CLUSTER__TIMEOUT_SECS", "5"),
            ("ROTATION_RECOVERY_WINDOW_DAYS", "7"),
        ]))?;
        assert_eq!(config.exclude_characters, "%&");
        assert_eq!(config.cluster.port, 9200);
        assert!(!config.cluster.verify_certs);
        assert!(config.cluster.use_tls);
        assert_eq!(config.cluster.timeout_secs, 5);
        assert_eq!(config.recovery_window_days, 7);
        Ok(())
    }

    #[test]
    fn malformed_value_is_a_configuration_error() {
        let err = RotationConfig::from_vars(vars(&[("ROTATION_CLUSTER__PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn exclude_characters_are_kept_verbatim() -> Result<(), Error> {
        for raw in ["TRUE", "1e5", "+7", "1.0", "Infinity", "0x1F", " %& "] {
            let config = RotationConfig::from_vars(vars(&[("EXCLUDE_CHARACTERS", raw)]))?;
            assert_eq!(config.exclude_characters, raw);
        }
        Ok(())
    }

    #[test]
    fn unrelated_variables_are_ignored() -> Result<(), Error> {
        let config = RotationConfig::from_vars(vars(&[
            ("CLUSTER", "prod-eu"),
            ("CLUSTER__PORT", "not-a-port"),
            ("RECOVERY_WINDOW_DAYS", "many"),
            ("PATH", "/usr/bin"),
            ("EXCLUDE_CHARACTERS", "/@"),
        ]))?;
        assert_eq!(config.exclude_characters, "/@");
        assert_eq!(config.cluster, ConnectionOptions::default());
        assert_eq!(config.recovery_window_days, DEFAULT_RECOVERY_WINDOW_DAYS);
        Ok(())
    }
}
