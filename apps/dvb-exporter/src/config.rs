use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "dvb-exporter")]
#[command(version, about = "Prometheus exporter for DVB tuner frontends")]
pub struct Args {
    /// Base path to DVB adapters
    #[arg(long, default_value = "/dev/dvb")]
    pub devpath: PathBuf,

    /// Listen bind in format [host]:port
    #[arg(long, default_value = ":8027")]
    pub listen: String,

    /// Per-frontend poll timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub scrape_timeout_ms: u64,

    /// Hardware access backend
    #[arg(long, value_enum, default_value_t = Backend::native())]
    pub backend: Backend,
}

impl Args {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_millis(self.scrape_timeout_ms)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Backend {
    /// Linux DVB API ioctls
    Linux,
    /// Scripted in-process frontends
    Mock,
}

impl Backend {
    /// `Linux` when this build can talk to the kernel, otherwise `Mock`.
    pub fn native() -> Self {
        if Self::linux_available() {
            Backend::Linux
        } else {
            Backend::Mock
        }
    }

    pub fn linux_available() -> bool {
        cfg!(all(feature = "linuxdvb", target_os = "linux"))
    }
}

/// Turn `[host]:port` into something `TcpListener::bind` accepts. An empty host
/// binds every IPv4 interface.
pub fn bind_address(listen: &str) -> Result<String> {
    let Some((host, port)) = listen.rsplit_once(':') else {
        bail!("listen address {listen:?} is not in the form [host]:port");
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in listen address {listen:?}"))?;
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok(format!("{host}:{port}"))
}
