use axum::http::Method;
use std::error::Error;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Identity of one inbound call, for log lines.
#[derive(Debug, Clone)]
pub struct CallInfo {
    pub method: Method,
    /// Path plus raw query, as received.
    pub target: String,
}

/// Sink for dispatcher events. Shared by every call of one server instance.
pub trait Logger: Send + Sync + 'static {
    /// A call reached its handler.
    fn debug(&self, call: &CallInfo);

    /// The handler failed with an unexpected defect.
    fn panic(&self, call: &CallInfo, defect: &str);

    /// The call was aborted.
    fn fatal(&self, call: &CallInfo, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Default logger: forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, call: &CallInfo) {
        debug!(method = %call.method, uri = %call.target, "dispatch");
    }

    fn panic(&self, call: &CallInfo, defect: &str) {
        error!(method = %call.method, uri = %call.target, defect, "recovered a panic in handler");
    }

    fn fatal(&self, call: &CallInfo, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match cause {
            Some(cause) => warn!(method = %call.method, uri = %call.target, cause = %cause, "{}", message),
            None => warn!(method = %call.method, uri = %call.target, "{}", message),
        }
    }
}
