//! Factory for creating the appropriate Connector from a connection string.

use std::path::Path;

use ndbroll_core::error::RollingError;

use crate::session::Connector;
use crate::simulated::SimulatedCluster;

/// Create a Connector for `connect_string`.
///
/// Supported schemes:
/// - `sim:<topology.toml>`: in-process simulated cluster described by a topology file
pub fn create_connector(connect_string: &str) -> anyhow::Result<Box<dyn Connector>> {
    match connect_string.split_once(':') {
        Some(("sim", path)) if !path.is_empty() => {
            let cluster = SimulatedCluster::from_topology_file(Path::new(path))?;
            tracing::info!("Using simulated cluster from {path}");
            Ok(Box::new(cluster))
        }
        Some(("sim", _)) => Err(RollingError::UnknownBackend(
            "sim: requires a topology file path, e.g. sim:cluster.toml".to_string(),
        )
        .into()),
        _ => Err(RollingError::UnknownBackend(format!(
            "no management backend for '{connect_string}' (supported: sim:<topology.toml>)"
        ))
        .into()),
    }
}
