//! `ncp-server`: boots the emulated cluster and serves its HTTP control surface.

use std::sync::Arc;

use clap::Parser;
use ncp_emulator::{Cluster, ClusterConfig, ClusterSnnCoordinator};
use ncp_server::config::{CliArgs, ClusterRuntimeConfig};
use ncp_server::routes::build_router;
use ncp_server::state::{AppState, SimulationConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let verbose = args.verbose;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose > 0 { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = ClusterRuntimeConfig::resolve(args)?;
    info!(host = %config.host, port = config.port, "starting ncp-server");

    let cluster = Arc::new(Cluster::new(ClusterConfig {
        backplanes: config.backplane_pairs(),
        bus_latency_us: config.bus_latency_us,
        timestep_us: config.timestep_us,
    }));
    cluster.start_simulation();

    let coordinator = Arc::new(ClusterSnnCoordinator::new());
    let sim_config = SimulationConfig {
        bus_latency_us: config.bus_latency_us,
        timestep_us: config.timestep_us,
    };
    let state = Arc::new(AppState::new(Arc::clone(&cluster), Arc::clone(&coordinator), sim_config));

    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router).await?;

    coordinator.stop_all();
    cluster.stop_simulation();
    Ok(())
}
