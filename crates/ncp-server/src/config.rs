//! Runtime configuration: CLI flags > environment variables > defaults

use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Command-line arguments for the `ncp-server` binary
#[derive(Debug, Parser)]
#[command(name = "ncp-server", about = "HTTP control surface for an emulated neuromorphic cluster")]
pub struct CliArgs {
    /// Host to bind the HTTP server on
    #[arg(long, env = "NCP_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server on
    #[arg(long, env = "NCP_PORT")]
    pub port: Option<u16>,

    /// Bus latency applied to every backplane, in microseconds
    #[arg(long, env = "NCP_BUS_LATENCY_US")]
    pub bus_latency_us: Option<u64>,

    /// Default SNN engine timestep, in microseconds
    #[arg(long, env = "NCP_TIMESTEP_US")]
    pub timestep_us: Option<u64>,

    /// Optional TOML config file supplying a cluster descriptor
    #[arg(long)]
    pub config_file: Option<std::path::PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// A single backplane's shape, as loaded from an optional TOML config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackplaneSpec {
    /// Backplane name
    pub name: String,
    /// Node count, at most [`ncp_layout::NodeId::MAX_PER_BACKPLANE`]
    pub node_count: u8,
}

/// Optional on-disk configuration, following the teacher's TOML-backed config convention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Backplanes to create at startup, if given
    #[serde(default)]
    pub backplanes: Vec<BackplaneSpec>,
}

impl ConfigFile {
    /// Load a config file, or fall back to an empty default if `path` is `None`
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ServerError::bad_request(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::bad_request(format!("reading config file: {e}")))?;
        toml::from_str(&content).map_err(|e| ServerError::bad_request(format!("invalid config file: {e}")))
    }
}

/// Fully resolved runtime configuration, built once in `main` and never
/// re-read by any component afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRuntimeConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Bus latency for every backplane, in microseconds
    pub bus_latency_us: u64,
    /// Default SNN engine timestep, in microseconds
    pub timestep_us: u64,
    /// Backplanes to create at startup
    pub backplanes: Vec<BackplaneSpec>,
}

impl Default for ClusterRuntimeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            bus_latency_us: 100,
            timestep_us: 1000,
            backplanes: vec![BackplaneSpec { name: "backplane0".to_string(), node_count: 16 }],
        }
    }
}

impl ClusterRuntimeConfig {
    /// Resolve the final configuration: CLI flags override environment
    /// variables (already folded into `args` by clap's `env` attribute),
    /// which override the config file, which overrides compiled-in defaults.
    pub fn resolve(args: CliArgs) -> ServerResult<Self> {
        let file = ConfigFile::load(args.config_file.as_deref())?;
        let mut config = Self::default();
        if !file.backplanes.is_empty() {
            config.backplanes = file.backplanes;
        }
        if let Some(host) = args.host {
            config.host = host;
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(bus_latency_us) = args.bus_latency_us {
            config.bus_latency_us = bus_latency_us;
        }
        if let Some(timestep_us) = args.timestep_us {
            config.timestep_us = timestep_us;
        }
        Ok(config)
    }

    /// `(name, node_count)` pairs suitable for [`ncp_emulator::ClusterConfig`]
    pub fn backplane_pairs(&self) -> Vec<(String, u8)> {
        self.backplanes.iter().map(|b| (b.name.clone(), b.node_count)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_backplane() {
        let config = ClusterRuntimeConfig::default();
        assert_eq!(config.backplanes.len(), 1);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = ConfigFile::load(Some(Path::new("/nonexistent/ncp.toml")));
        assert!(result.is_err());
    }
}
