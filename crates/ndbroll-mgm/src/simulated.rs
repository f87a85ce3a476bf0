//! In-process cluster used for dry runs and tests.
//!
//! The cluster is described by a [`Topology`] (usually a TOML file) and
//! shared between the connector and every session it hands out, so a test
//! can inject faults and inspect the call journal while a run is in flight.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use ndbroll_core::error::{Result, RollingError};
use ndbroll_core::types::{ClusterSnapshot, NodeId, NodeState, NodeStatus};

use crate::session::{Connector, Readiness, RestartFlags, RestartReply, Session};

/// Cluster layout plus faults to replay, as read from a topology file.
///
/// ```toml
/// cluster_name = "demo"
///
/// [faults]
/// wait_timeouts = 1
///
/// [[nodes]]
/// node_id = 1
/// node_group = 0
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default)]
    pub faults: SimFaults,
    #[serde(default)]
    pub nodes: Vec<NodeState>,
}

fn default_cluster_name() -> String {
    "simulated".to_string()
}

impl Topology {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let topology: Topology =
            toml::from_str(&content).map_err(|e| RollingError::TomlDe(e.to_string()))?;
        topology.validate()?;
        Ok(topology)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.node_id) {
                return Err(RollingError::Topology(format!(
                    "duplicate node_id {}",
                    node.node_id
                )));
            }
        }
        Ok(())
    }
}

/// Pending faults. Each counter is consumed by the next matching call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimFaults {
    #[serde(default)]
    pub connect_failures: u32,
    #[serde(default)]
    pub wait_timeouts: u32,
    #[serde(default)]
    pub wait_errors: u32,
    #[serde(default)]
    pub restart_rejections: u32,
    #[serde(default)]
    pub restart_errors: u32,
    #[serde(default)]
    pub restart_disconnects: u32,
    /// Refuse every connection attempt until cleared.
    #[serde(default)]
    pub unreachable: bool,
}

/// One call observed by the simulated endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Connected { session: u64 },
    ConnectFailed,
    Closed { session: u64 },
    Ready(Vec<NodeId>),
    WaitTimedOut(Vec<NodeId>),
    WaitFailed(Vec<NodeId>),
    Restarted(NodeId),
    RestartRejected(NodeId),
    RestartFailed(NodeId),
    Disconnected { session: u64 },
    Status,
    DumpState(NodeId),
}

#[derive(Debug)]
struct SimState {
    cluster_name: String,
    nodes: Vec<NodeState>,
    faults: SimFaults,
    journal: Vec<SimEvent>,
    next_session: u64,
    live_session: Option<u64>,
}

impl SimState {
    fn node_mut(&mut self, node_id: NodeId) -> Option<&mut NodeState> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    fn check_live(&self, session: u64) -> anyhow::Result<()> {
        if self.live_session != Some(session) {
            anyhow::bail!("management session {session} is not connected");
        }
        Ok(())
    }
}

/// Shared handle to a simulated cluster. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct SimulatedCluster {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedCluster {
    pub fn new(cluster_name: &str, nodes: Vec<NodeState>) -> Self {
        Self::from_topology(Topology {
            cluster_name: cluster_name.to_string(),
            faults: SimFaults::default(),
            nodes,
        })
    }

    pub fn from_topology(topology: Topology) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                cluster_name: topology.cluster_name,
                nodes: topology.nodes,
                faults: topology.faults,
                journal: Vec::new(),
                next_session: 1,
                live_session: None,
            })),
        }
    }

    pub fn from_topology_file(path: &Path) -> Result<Self> {
        Ok(Self::from_topology(Topology::load(path)?))
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock leaves consistent data behind.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next_connects(&self, n: u32) {
        self.lock().faults.connect_failures += n;
    }

    pub fn time_out_next_waits(&self, n: u32) {
        self.lock().faults.wait_timeouts += n;
    }

    pub fn fail_next_waits(&self, n: u32) {
        self.lock().faults.wait_errors += n;
    }

    pub fn reject_next_restarts(&self, n: u32) {
        self.lock().faults.restart_rejections += n;
    }

    pub fn fail_next_restarts(&self, n: u32) {
        self.lock().faults.restart_errors += n;
    }

    pub fn disconnect_next_restarts(&self, n: u32) {
        self.lock().faults.restart_disconnects += n;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().faults.unreachable = unreachable;
    }

    /// Force a node's status, e.g. to start a run with a node down.
    pub fn set_status(&self, node_id: NodeId, status: NodeStatus) {
        if let Some(node) = self.lock().node_mut(node_id) {
            node.status = status;
        }
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        let state = self.lock();
        ClusterSnapshot::new(state.cluster_name.clone(), state.nodes.clone())
    }

    pub fn journal(&self) -> Vec<SimEvent> {
        self.lock().journal.clone()
    }

    /// Nodes whose restart was accepted, in the order it happened.
    pub fn restart_order(&self) -> Vec<NodeId> {
        self.lock()
            .journal
            .iter()
            .filter_map(|e| match e {
                SimEvent::Restarted(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|e| matches!(e, SimEvent::Connected { .. }))
            .count()
    }
}

#[async_trait]
impl Connector for SimulatedCluster {
    async fn connect(
        &self,
        endpoint: &str,
        retries: u32,
        retry_delay: Duration,
    ) -> anyhow::Result<Box<dyn Session>> {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            {
                let mut state = self.lock();
                let refused = if state.faults.unreachable {
                    true
                } else if state.faults.connect_failures > 0 {
                    state.faults.connect_failures -= 1;
                    true
                } else {
                    false
                };

                if !refused {
                    let session = state.next_session;
                    state.next_session += 1;
                    state.live_session = Some(session);
                    state.journal.push(SimEvent::Connected { session });
                    tracing::debug!(endpoint, session, "simulated session opened");
                    return Ok(Box::new(SimSession {
                        cluster: self.clone(),
                        id: session,
                        closed: false,
                    }));
                }
                state.journal.push(SimEvent::ConnectFailed);
            }
            tracing::debug!(endpoint, attempt, attempts, "simulated connect refused");
            if attempt < attempts {
                tokio::time::sleep(retry_delay).await;
            }
        }
        anyhow::bail!("could not connect to {endpoint} after {attempts} attempts")
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Session handed out by [`SimulatedCluster`].
pub struct SimSession {
    cluster: SimulatedCluster,
    id: u64,
    closed: bool,
}

#[async_trait]
impl Session for SimSession {
    async fn wait_until_ready(
        &mut self,
        node_ids: &[NodeId],
        _timeout: Duration,
    ) -> anyhow::Result<Readiness> {
        let mut state = self.cluster.lock();
        state.check_live(self.id)?;

        // Cluster-wide waits only happen during session setup.
        if node_ids.is_empty() {
            return Ok(Readiness::Ready);
        }

        if state.faults.wait_errors > 0 {
            state.faults.wait_errors -= 1;
            state.journal.push(SimEvent::WaitFailed(node_ids.to_vec()));
            anyhow::bail!("transporter error while waiting for nodes {node_ids:?}");
        }
        if state.faults.wait_timeouts > 0 {
            state.faults.wait_timeouts -= 1;
            state.journal.push(SimEvent::WaitTimedOut(node_ids.to_vec()));
            return Ok(Readiness::Timeout);
        }

        for &id in node_ids {
            let node = state
                .node_mut(id)
                .ok_or_else(|| anyhow::anyhow!("node {id} is not part of the cluster"))?;
            // Nodes come back on their own once someone waits for them.
            node.status = NodeStatus::Started;
            node.start_phase = 0;
        }
        state.journal.push(SimEvent::Ready(node_ids.to_vec()));
        Ok(Readiness::Ready)
    }

    async fn cluster_status(&mut self) -> anyhow::Result<ClusterSnapshot> {
        let mut state = self.cluster.lock();
        state.check_live(self.id)?;
        state.journal.push(SimEvent::Status);
        Ok(ClusterSnapshot::new(
            state.cluster_name.clone(),
            state.nodes.clone(),
        ))
    }

    async fn restart_node(
        &mut self,
        node_id: NodeId,
        flags: RestartFlags,
    ) -> anyhow::Result<RestartReply> {
        let mut state = self.cluster.lock();
        state.check_live(self.id)?;

        if state.faults.restart_errors > 0 {
            state.faults.restart_errors -= 1;
            state.journal.push(SimEvent::RestartFailed(node_id));
            anyhow::bail!("transporter error sending restart for node {node_id}");
        }
        if state.faults.restart_rejections > 0 {
            state.faults.restart_rejections -= 1;
            state.journal.push(SimEvent::RestartRejected(node_id));
            return Ok(RestartReply {
                code: 0,
                disconnected: false,
            });
        }

        let node = state
            .node_mut(node_id)
            .ok_or_else(|| anyhow::anyhow!("node {node_id} is not part of the cluster"))?;
        node.status = if flags.no_start {
            NodeStatus::NoContact
        } else {
            NodeStatus::Restarting
        };
        node.connect_count += 1;
        state.journal.push(SimEvent::Restarted(node_id));

        let disconnected = state.faults.restart_disconnects > 0;
        if disconnected {
            state.faults.restart_disconnects -= 1;
            state.live_session = None;
            state
                .journal
                .push(SimEvent::Disconnected { session: self.id });
        }

        Ok(RestartReply {
            code: 1,
            disconnected,
        })
    }

    async fn dump_state(&mut self, node_id: NodeId) -> anyhow::Result<String> {
        let mut state = self.cluster.lock();
        state.check_live(self.id)?;
        state.journal.push(SimEvent::DumpState(node_id));
        match state.nodes.iter().find(|n| n.node_id == node_id) {
            Some(n) if n.is_online() => Ok("ok".to_string()),
            Some(n) => Ok(format!("node is {}", n.status)),
            None => anyhow::bail!("Could not dump state of node {node_id}"),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.cluster.lock();
        if state.live_session == Some(self.id) {
            state.live_session = None;
        }
        state.journal.push(SimEvent::Closed { session: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cluster() -> SimulatedCluster {
        SimulatedCluster::new(
            "sim-test",
            vec![NodeState::data(1, 0), NodeState::data(2, 0), NodeState::data(3, 1)],
        )
    }

    #[tokio::test]
    async fn restart_then_wait_brings_node_back() {
        let cluster = cluster();
        let mut session = cluster.connect("sim", 1, Duration::ZERO).await.unwrap();

        let reply = session.restart_node(2, RestartFlags::rolling()).await.unwrap();
        assert!(reply.accepted());
        assert!(!reply.disconnected);
        assert_eq!(cluster.snapshot().node(2).unwrap().status, NodeStatus::Restarting);

        let ready = session.wait_until_ready(&[2], Duration::ZERO).await.unwrap();
        assert_eq!(ready, Readiness::Ready);
        let node = cluster.snapshot().node(2).cloned().unwrap();
        assert_eq!(node.status, NodeStatus::Started);
        assert_eq!(node.connect_count, 1);
        assert_eq!(cluster.restart_order(), vec![2]);
    }

    #[tokio::test]
    async fn connect_retries_within_one_call() {
        let cluster = cluster();
        cluster.fail_next_connects(2);
        assert!(cluster.connect("sim", 2, Duration::ZERO).await.is_err());
        cluster.fail_next_connects(1);
        assert!(cluster.connect("sim", 3, Duration::ZERO).await.is_ok());
        assert_eq!(cluster.connect_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_refuses_everything() {
        let cluster = cluster();
        cluster.set_unreachable(true);
        assert!(cluster.connect("sim", 3, Duration::ZERO).await.is_err());
        cluster.set_unreachable(false);
        assert!(cluster.connect("sim", 1, Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_invalidates_session() {
        let cluster = cluster();
        cluster.disconnect_next_restarts(1);
        let mut session = cluster.connect("sim", 1, Duration::ZERO).await.unwrap();
        let reply = session.restart_node(1, RestartFlags::rolling()).await.unwrap();
        assert!(reply.accepted());
        assert!(reply.disconnected);
        assert!(session.cluster_status().await.is_err());
    }

    #[tokio::test]
    async fn faults_are_consumed_once() {
        let cluster = cluster();
        cluster.time_out_next_waits(1);
        cluster.reject_next_restarts(1);
        let mut session = cluster.connect("sim", 1, Duration::ZERO).await.unwrap();

        assert_eq!(
            session.wait_until_ready(&[1], Duration::ZERO).await.unwrap(),
            Readiness::Timeout
        );
        assert_eq!(
            session.wait_until_ready(&[1], Duration::ZERO).await.unwrap(),
            Readiness::Ready
        );
        assert!(!session.restart_node(1, RestartFlags::rolling()).await.unwrap().accepted());
        assert!(session.restart_node(1, RestartFlags::rolling()).await.unwrap().accepted());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_logged_once() {
        let cluster = cluster();
        let mut session = cluster.connect("sim", 1, Duration::ZERO).await.unwrap();
        session.close().await;
        session.close().await;
        let closes = cluster
            .journal()
            .iter()
            .filter(|e| matches!(e, SimEvent::Closed { .. }))
            .count();
        assert_eq!(closes, 1);
        assert!(session.cluster_status().await.is_err());
    }

    #[tokio::test]
    async fn dump_state_reports_offline_nodes() {
        let cluster = cluster();
        cluster.set_status(3, NodeStatus::NoContact);
        let mut session = cluster.connect("sim", 1, Duration::ZERO).await.unwrap();
        assert_eq!(session.dump_state(1).await.unwrap(), "ok");
        assert_eq!(session.dump_state(3).await.unwrap(), "node is NO_CONTACT");
        assert!(session.dump_state(99).await.is_err());
    }

    #[test]
    fn topology_file_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cluster.toml");
        std::fs::write(
            &path,
            r#"
cluster_name = "lab"

[faults]
wait_timeouts = 2

[[nodes]]
node_id = 1
node_group = 0

[[nodes]]
node_id = 2
node_group = 0
status = "no_contact"

[[nodes]]
node_id = 49
node_group = -1
node_type = "mgm"
"#,
        )
        .unwrap();
        let topology = Topology::load(&path).unwrap();
        assert_eq!(topology.cluster_name, "lab");
        assert_eq!(topology.faults.wait_timeouts, 2);
        assert_eq!(topology.nodes.len(), 3);
        assert_eq!(topology.nodes[1].status, NodeStatus::NoContact);

        let cluster = SimulatedCluster::from_topology(topology);
        assert_eq!(cluster.snapshot().restartable_nodes().len(), 2);
    }

    #[test]
    fn topology_rejects_duplicate_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cluster.toml");
        std::fs::write(
            &path,
            "[[nodes]]\nnode_id = 1\nnode_group = 0\n[[nodes]]\nnode_id = 1\nnode_group = 1\n",
        )
        .unwrap();
        assert!(matches!(
            Topology::load(&path),
            Err(RollingError::Topology(_))
        ));
    }
}
