use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dvb_exporter::{bind_address, serve, AppState, Args, Backend};
use dvb_frontend::MockFrontend;
use dvb_registry::{MetricsHub, Registry, RegistryError};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() {
    setup_tracing();

    let args = Args::parse();

    let registry = match open_registry(&args) {
        Ok(reg) => reg,
        Err(e) => {
            eprintln!("{e:#}");
            let code = e
                .downcast_ref::<RegistryError>()
                .map_or(1, RegistryError::exit_code);
            std::process::exit(code);
        }
    };
    info!(
        devpath = %args.devpath.display(),
        frontends = registry.len(),
        "device scan complete"
    );

    if let Err(e) = run(&args, registry).await {
        eprintln!("Error listening: {e:#}");
        std::process::exit(1);
    }
}

fn open_registry(args: &Args) -> Result<Registry> {
    let reg = match args.backend {
        Backend::Mock => Registry::scan::<MockFrontend>(&args.devpath)?,
        #[cfg(all(feature = "linuxdvb", target_os = "linux"))]
        Backend::Linux => Registry::scan::<dvb_frontend::LinuxFrontend>(&args.devpath)?,
        #[cfg(not(all(feature = "linuxdvb", target_os = "linux")))]
        Backend::Linux => {
            return Err(anyhow!(
                "the linux backend is not available in this build; use --backend mock"
            ))
        }
    };
    Ok(reg)
}

async fn run(args: &Args, registry: Registry) -> Result<()> {
    let hub = MetricsHub::new().context("failed to create metrics hub")?;
    let state = AppState::new(registry, hub, args.scrape_timeout());
    let addr = bind_address(&args.listen)?;
    let listener = TcpListener::bind(addr.as_str()).await?;
    serve(listener, state).await
}

fn setup_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
