//! shipgate-core — gateway configuration shared by the other crates.
//!
//! [`GatewayConfig`] starts from built-in defaults, is overlaid by an
//! optional TOML file, then by the `NOMAD_URL`, `NOMAD_TOKEN`,
//! `SKIP_TLS_VERIFY`, `RPC_SECRET`, `PORT`, `SHIPGATE_DATA_DIR` and
//! `SHIPGATE_IDENTITY` environment variables, and is validated last.

pub mod config;

pub use config::{ConfigError, GatewayConfig};
