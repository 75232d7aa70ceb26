//! The invocation surface: one call per rotation step delivered by the trigger.
//!
//! 中文: 调用入口。触发器每投递一个轮换步骤就调用一次。

use crate::contract::{RotationEvent, RotationRequest};
use crate::error::Error;
use crate::rotation::RotationController;
use tracing::{Instrument, info_span};
use tracing_subscriber::EnvFilter;

/// Runtime information about the current invocation. Only used for log correlation.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub request_id: String,
    pub function_name: Option<String>,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            function_name: None,
        }
    }
}

/// Parses a raw trigger payload and runs the requested step.
///
/// Returns `Ok(())` when the step succeeded or had nothing to do. Any error
/// means "step failed"; the trigger decides whether and when to retry.
pub async fn handle_event(
    controller: &RotationController,
    event: serde_json::Value,
    context: &InvocationContext,
) -> Result<(), Error> {
    let event: RotationEvent = serde_json::from_value(event).map_err(Error::Deserialize)?;
    let request = RotationRequest::try_from(event)?;

    let span = info_span!(
        "rotation",
        request_id = %context.request_id,
        function = context.function_name.as_deref().unwrap_or_default(),
        secret_id = %request.secret_id,
        step = %request.step
    );
    controller.handle(&request).instrument(span).await
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Calling it more than once is harmless; later calls leave the first subscriber in place.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();
}
