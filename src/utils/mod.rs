//! Utility module: errors, logging, and time.

pub mod errors;
pub mod logging;
pub mod time;

pub use errors::{Abort, ClientError, ConfigError, ErrorBody, ErrorKind};
pub use logging::{init_logging, CallInfo, Logger, TracingLogger};
pub use time::now;
