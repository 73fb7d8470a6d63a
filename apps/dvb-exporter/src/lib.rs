//! dvb-exporter: Prometheus exporter for DVB tuner frontends

pub mod config;
pub mod server;

pub use config::{bind_address, Args, Backend};
pub use server::{router, scrape, serve, AppState};
