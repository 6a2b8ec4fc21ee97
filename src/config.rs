//! Server configuration from the command line and environment.

use clap::Parser;

use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// RippleKV - an in-memory key-value server speaking RESP
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ripplekv", version, about)]
pub struct Config {
    /// Host to bind to
    #[arg(short = 'H', long, env = "RIPPLEKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RIPPLEKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "ripplekv=debug")
    #[arg(long, env = "RIPPLEKV_LOG", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
