//! Installs the `env_logger` backend behind the `log` facade used everywhere.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
