//! The four-step rotation protocol.
//!
//! A rotation moves a credential from the version holding AWSCURRENT to a new
//! version staged as AWSPENDING:
//!
//! 1. `createSecret` stages the new credential in the store.
//! 2. `setSecret` changes the password on the cluster.
//! 3. `testSecret` proves the new credential opens a session.
//! 4. `finishSecret` moves AWSCURRENT onto the new version.
//!
//! The trigger may deliver any step more than once. `createSecret` and
//! `finishSecret` are no-ops on repeat; `setSecret` and `testSecret` only run
//! while the request token is still staged as pending and not yet current.
//!
//! 中文: 四步轮换协议。每一步都可能被重复投递，控制器在分发前总是重新校验版本的阶段标签。

mod controller;
mod steps;

pub use controller::RotationController;
