//! # Rotation-Kit: Staged Credential Rotation for Search Clusters
//!
//! `rotation-kit` implements the four-step rotation protocol a secrets-management
//! service drives for a search-cluster credential: `createSecret`, `setSecret`,
//! `testSecret` and `finishSecret`.
//!
//! It coordinates two systems it does not own, a versioned secret store with
//! staged labels and a cluster authentication endpoint, so that every step is
//! either a no-op on retry or only runs while the request token is still staged
//! as pending.
//!
//! ## Core Concepts
//!
//! - **`RotationController`**: Validates a request against fresh store metadata and dispatches the step.
//! - **`SecretStore`**: The versioned secret store consumed by the controller.
//! - **`ClusterAuth`**: Opens authenticated cluster sessions that can change a password.
//! - **`CredentialDict`**: The `endpoint` / `login` / `password` payload of one secret version.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rotation_kit::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     rotation_kit::handler::init_logging();
//!
//!     let store = Arc::new(InMemorySecretStore::new());
//!     store.create_secret("search-admin", r#"{"endpoint":"a.example.com","login":"svc","password":"p1"}"#)?;
//!     let token = store.start_rotation("search-admin")?;
//!
//!     let cluster = InMemoryCluster::new("a.example.com");
//!     cluster.add_user("svc", "p1");
//!
//!     let controller = RotationController::new(store, Arc::new(cluster), RotationConfig::from_env()?);
//!     for step in RotationStep::ALL {
//!         controller.handle(&RotationRequest::new("search-admin", &token, step)).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod config;
pub mod contract;
pub mod credential;
pub mod error;
pub mod handler;
pub mod rotation;
pub mod store;

// --- Prelude ---
// The types most callers need to wire up and drive a rotation.
pub mod prelude {
    pub use crate::cluster::{ClusterAuth, ClusterError, ClusterSession, ConnectionOptions};
    pub use crate::config::RotationConfig;
    pub use crate::contract::{RotationEvent, RotationRequest, RotationStep};
    pub use crate::credential::CredentialDict;
    pub use crate::error::Error;
    pub use crate::rotation::RotationController;
    pub use crate::store::{AWSCURRENT, AWSPENDING, SecretStore, StoreError};

    #[cfg(feature = "memory")]
    pub use crate::cluster::memory::InMemoryCluster;
    #[cfg(feature = "memory")]
    pub use crate::store::memory::InMemorySecretStore;
}

pub use error::Error;
pub use rotation::RotationController;

/// The version of the `rotation-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
