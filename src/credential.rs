//! The credential payload stored in each secret version.
//!
//! 中文: 每个密钥版本中存储的凭据载荷。

use crate::error::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Keys that every credential payload must carry, in validation order.
pub const REQUIRED_FIELDS: [&str; 3] = ["endpoint", "login", "password"];

/// A cluster credential as stored in one secret version.
///
/// Keys other than `endpoint`, `login` and `password` are kept in `extra`
/// and written back unchanged when a new version is derived from this one.
///
/// 中文: 一个集群凭据。除三个必需字段之外的键保存在 `extra` 中，并在派生新版本时原样保留。
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialDict {
    /// Cluster endpoint host, e.g. `mycluster.example.com`.
    pub endpoint: String,
    /// Cluster user login.
    pub login: String,
    #[serde(
        serialize_with = "serialize_password",
        deserialize_with = "deserialize_password"
    )]
    pub password: SecretString,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialDict {
    pub fn new(
        endpoint: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            login: login.into(),
            password: SecretString::from(password.into()),
            extra: Map::new(),
        }
    }

    /// Parses and validates a raw secret string.
    ///
    /// Fails with `Error::MalformedSecret` naming the first required key that is absent.
    ///
    /// 中文: 解析并校验原始密钥字符串，缺失必需字段时报告第一个缺失的字段。
    pub fn from_secret_string(secret_string: &str) -> Result<Self, Error> {
        let map: Map<String, Value> =
            serde_json::from_str(secret_string).map_err(Error::Deserialize)?;
        if let Some(field) = REQUIRED_FIELDS.into_iter().find(|f| !map.contains_key(*f)) {
            return Err(Error::MalformedSecret { field });
        }
        serde_json::from_value(Value::Object(map)).map_err(Error::Deserialize)
    }

    /// Serializes the credential into the secret string form the store keeps.
    pub fn to_secret_string(&self) -> Result<SecretString, Error> {
        let json = serde_json::to_string(self)?;
        Ok(SecretString::from(json))
    }

    /// Derives a new credential with the same endpoint, login and extra keys.
    pub fn with_password(self, password: SecretString) -> Self {
        Self { password, ..self }
    }

    /// Returns `true` if both credentials name the same user on the same cluster
    /// and carry the same extra keys. Passwords are not compared.
    pub fn same_identity(&self, other: &CredentialDict) -> bool {
        self.endpoint == other.endpoint && self.login == other.login && self.extra == other.extra
    }
}

fn serialize_password<S: Serializer>(password: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(password.expose_secret())
}

fn deserialize_password<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}
