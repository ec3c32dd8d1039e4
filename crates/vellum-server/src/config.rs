use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use vellum_engine::device::GpuInit;
use vellum_engine::logging::LoggingConfig;
use vellum_wire::ByteOrder;

/// What to do when a client sends something the server cannot follow.
#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FatalPolicy {
    /// Drop the client and wait for the next one.
    #[default]
    Reset,
    /// Terminate the server with an error.
    Exit,
}

/// Render server driven over a local socket.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ServerConfig {
    /// Socket path clients connect to.
    #[arg(short, long, default_value = "vellum.socket")]
    pub address: PathBuf,

    /// Render off-screen only; no window is opened.
    #[arg(long)]
    pub headless: bool,

    /// Width of the off-screen canvas, in pixels.
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Height of the off-screen canvas, in pixels.
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Byte order of multi-byte wire values; must match the client.
    #[arg(long, default_value = "native")]
    pub byte_order: ByteOrder,

    /// Log filter, e.g. "debug" or "vellum_wire=debug". Defaults to RUST_LOG.
    #[arg(long = "log")]
    pub log_filter: Option<String>,

    /// Leave timestamps off log records.
    #[arg(long)]
    pub no_log_timestamps: bool,

    /// Refuse software adapters; fail instead when no GPU is present.
    #[arg(long)]
    pub hardware_only: bool,

    #[arg(long, value_enum, default_value_t = FatalPolicy::Reset)]
    pub on_fatal: FatalPolicy,
}

impl ServerConfig {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.log_filter.clone(),
            timestamps: !self.no_log_timestamps,
            ..LoggingConfig::default()
        }
    }

    pub fn gpu_init(&self) -> GpuInit {
        GpuInit {
            allow_software: !self.hardware_only,
            ..GpuInit::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::try_parse_from(["vellum-server"]).unwrap();
        assert_eq!(config.address, PathBuf::from("vellum.socket"));
        assert!(!config.headless);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.byte_order, ByteOrder::Native);
        assert_eq!(config.on_fatal, FatalPolicy::Reset);
        assert!(config.log_filter.is_none());
        assert!(config.logging().timestamps);
        assert!(config.gpu_init().allow_software);
    }

    #[test]
    fn all_flags() {
        let config = ServerConfig::try_parse_from([
            "vellum-server",
            "--address",
            "/tmp/v.sock",
            "--headless",
            "--width",
            "64",
            "--height",
            "32",
            "--byte-order",
            "big",
            "--log",
            "debug",
            "--on-fatal",
            "exit",
            "--no-log-timestamps",
            "--hardware-only",
        ])
        .unwrap();
        assert_eq!(config.address, PathBuf::from("/tmp/v.sock"));
        assert!(config.headless);
        assert_eq!((config.width, config.height), (64, 32));
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert_eq!(config.on_fatal, FatalPolicy::Exit);

        let logging = config.logging();
        assert_eq!(logging.filter.as_deref(), Some("debug"));
        assert!(!logging.timestamps);
        assert!(!config.gpu_init().allow_software);
    }

    #[test]
    fn bad_byte_order_is_rejected() {
        assert!(ServerConfig::try_parse_from(["vellum-server", "--byte-order", "middle"]).is_err());
    }
}
