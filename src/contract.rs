//! Defines the data structures exchanged with the rotation trigger.
//!
//! 中文: 定义与轮换触发器之间交换的数据结构。

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four ordered phases of a rotation.
///
/// 中文: 轮换的四个有序阶段之一。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RotationStep {
    /// Stage a new credential version as AWSPENDING.
    CreateSecret,
    /// Push the pending password to the cluster.
    SetSecret,
    /// Prove the pending credential opens a session.
    TestSecret,
    /// Move AWSCURRENT onto the pending version.
    FinishSecret,
}

impl RotationStep {
    /// All steps, in the order the trigger invokes them.
    pub const ALL: [RotationStep; 4] = [
        RotationStep::CreateSecret,
        RotationStep::SetSecret,
        RotationStep::TestSecret,
        RotationStep::FinishSecret,
    ];

    /// The wire name of the step, e.g. `"createSecret"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "createSecret",
            RotationStep::SetSecret => "setSecret",
            RotationStep::TestSecret => "testSecret",
            RotationStep::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RotationStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| Error::InvalidStep(s.to_string()))
    }
}

/// The raw payload delivered by the trigger.
///
/// The step is kept as a string here so that an unknown value surfaces as
/// `Error::InvalidStep` instead of a generic deserialization failure.
///
/// 中文: 触发器投递的原始载荷。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RotationEvent {
    #[serde(rename = "SecretId")]
    pub secret_id: String,
    #[serde(rename = "ClientRequestToken")]
    pub client_request_token: String,
    #[serde(rename = "Step")]
    pub step: String,
}

/// A validated rotation request: which secret, which version, which step.
///
/// 中文: 经过校验的轮换请求。每次调用都重新构造，不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// The secret ARN or other identifier.
    pub secret_id: String,
    /// The version id the rotation is staging.
    pub token: String,
    pub step: RotationStep,
}

impl RotationRequest {
    pub fn new(secret_id: impl Into<String>, token: impl Into<String>, step: RotationStep) -> Self {
        Self {
            secret_id: secret_id.into(),
            token: token.into(),
            step,
        }
    }
}

impl TryFrom<RotationEvent> for RotationRequest {
    type Error = Error;

    fn try_from(event: RotationEvent) -> Result<Self, Self::Error> {
        let step = event.step.parse()?;
        Ok(Self {
            secret_id: event.secret_id,
            token: event.client_request_token,
            step,
        })
    }
}
