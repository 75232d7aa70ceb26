//!
//! 集成测试的通用辅助函数
//!

use rotation_kit::prelude::*;
use std::sync::Arc;

pub const SECRET_ID: &str = "arn:secret:search-admin";
pub const ENDPOINT: &str = "a.example.com";
pub const CURRENT_PAYLOAD: &str = r#"{"endpoint":"a.example.com","login":"svc","password":"p1"}"#;

/// 一个已启用轮换、带有 AWSPENDING 令牌的测试环境。
pub struct Fixture {
    pub store: Arc<InMemorySecretStore>,
    pub cluster: InMemoryCluster,
    pub controller: RotationController,
    pub current_version: String,
    pub token: String,
}

impl Fixture {
    pub fn request(&self, step: RotationStep) -> RotationRequest {
        RotationRequest::new(SECRET_ID, &self.token, step)
    }
}

pub fn setup() -> Fixture {
    setup_with(CURRENT_PAYLOAD, RotationConfig::default())
}

pub fn setup_with(payload: &str, config: RotationConfig) -> Fixture {
    rotation_kit::handler::init_logging();

    let store = Arc::new(InMemorySecretStore::new());
    let current_version = store.create_secret(SECRET_ID, payload).unwrap();
    let token = store.start_rotation(SECRET_ID).unwrap();

    let cluster = InMemoryCluster::new(ENDPOINT);
    cluster.add_user("svc", "p1");

    let controller = RotationController::new(store.clone(), Arc::new(cluster.clone()), config);
    Fixture {
        store,
        cluster,
        controller,
        current_version,
        token,
    }
}
