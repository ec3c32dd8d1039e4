//! Vellum render server.
//!
//! Listens on a local socket and renders whatever the connected client asks
//! for, either into a window or into an off-screen canvas (`--headless`).

mod commands;
mod config;
mod headless;
mod recovery;
mod session;
mod windowed;

use anyhow::Result;
use clap::Parser;
use vellum_engine::logging::init_logging;

use crate::config::ServerConfig;

fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_logging(config.logging());

    let init = config.gpu_init();
    if config.headless {
        headless::run(&config, &init)
    } else {
        windowed::run(config, init)
    }
}
