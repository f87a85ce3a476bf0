use std::fmt;

use ndbroll_core::error::Result;
use ndbroll_core::types::{ClusterSnapshot, NodeState, NodeStatus, NodeType};

use crate::supervisor::ConnectionSupervisor;

/// Operator-facing view of the cluster, printed before and after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub cluster_name: String,
    pub nodes: Vec<NodeReport>,
    pub online: usize,
    pub offline: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub state: NodeState,
    /// Output of the endpoint's state dump, when one was requested.
    pub dump_state: Option<String>,
}

impl ClusterSummary {
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        Self {
            cluster_name: snapshot.cluster_name.clone(),
            nodes: snapshot
                .nodes
                .iter()
                .map(|state| NodeReport {
                    state: state.clone(),
                    dump_state: None,
                })
                .collect(),
            online: snapshot.online_count(),
            offline: snapshot.offline_count(),
        }
    }

    /// Refresh the cluster status and dump the state of every node.
    pub async fn collect(supervisor: &mut ConnectionSupervisor) -> Result<Self> {
        let snapshot = supervisor.refresh_status().await?;
        let mut summary = Self::from_snapshot(&snapshot);
        for node in &mut summary.nodes {
            node.dump_state = Some(supervisor.dump_state(node.state.node_id).await);
        }
        Ok(summary)
    }

    pub fn total(&self) -> usize {
        self.nodes.len()
    }

    pub fn all_online(&self) -> bool {
        self.offline == 0
    }
}

impl fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cluster_name: {}", self.cluster_name)?;
        for node in &self.nodes {
            let s = &node.state;
            writeln!(f, "node_id: {} ({})", s.node_id, s.node_type)?;
            writeln!(f, "\tstatus: {}", s.status)?;
            if s.node_type == NodeType::Data && s.status == NodeStatus::Starting {
                writeln!(f, "\tstart_phase: {}", s.start_phase)?;
            }
            writeln!(f, "\tdynamic_id: {}", s.dynamic_id)?;
            writeln!(f, "\tnode_group: {}", s.node_group)?;
            writeln!(f, "\tversion: {}", s.version)?;
            writeln!(f, "\tconnect_count: {}", s.connect_count)?;
            writeln!(f, "\tconnect_address: {}", s.connect_address)?;
            if let Some(ref dump) = node.dump_state {
                writeln!(f, "\tdump_state: {dump}")?;
            }
        }
        writeln!(f, "no_of_nodes: {}", self.total())?;
        writeln!(f, "online_nodes: {}", self.online)?;
        write!(f, "offline_nodes: {}", self.offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndbroll_core::config::RollingSettings;
    use ndbroll_mgm::simulated::SimulatedCluster;

    fn snapshot() -> ClusterSnapshot {
        let mut starting = NodeState::data(2, 0);
        starting.status = NodeStatus::Starting;
        starting.start_phase = 4;
        ClusterSnapshot::new("report", vec![NodeState::data(1, 0), starting])
    }

    #[test]
    fn counts_online_and_offline() {
        let summary = ClusterSummary::from_snapshot(&snapshot());
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.online, 1);
        assert_eq!(summary.offline, 1);
        assert!(!summary.all_online());
    }

    #[test]
    fn display_shows_start_phase_only_while_starting() {
        let text = ClusterSummary::from_snapshot(&snapshot()).to_string();
        assert!(text.starts_with("cluster_name: report\n"));
        assert_eq!(text.matches("start_phase").count(), 1);
        assert!(text.contains("\tstart_phase: 4\n"));
        assert!(text.ends_with("offline_nodes: 1"));
        assert!(!text.contains("dump_state"));
    }

    #[tokio::test]
    async fn collect_includes_dump_state() {
        let cluster = SimulatedCluster::new("live", vec![NodeState::data(1, 0)]);
        let settings = RollingSettings {
            wait_seconds: 0,
            ..RollingSettings::default()
        };
        let mut sup = ConnectionSupervisor::connect(Box::new(cluster), &settings)
            .await
            .unwrap();
        let summary = ClusterSummary::collect(&mut sup).await.unwrap();
        assert!(summary.all_online());
        assert_eq!(summary.nodes[0].dump_state.as_deref(), Some("ok"));
        assert!(summary.to_string().contains("\tdump_state: ok\n"));
    }
}
