use std::time::Duration;

use async_trait::async_trait;
use ndbroll_core::types::{ClusterSnapshot, NodeId};

/// Flags passed along with a node restart command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartFlags {
    /// Wipe the node's data and rebuild it from its peers.
    pub initial: bool,
    /// Leave the node stopped after shutdown.
    pub no_start: bool,
    /// Skip the graceful shutdown.
    pub abort: bool,
    /// Restart even if the cluster would lose a group.
    pub force: bool,
}

impl RestartFlags {
    /// Preserve data, start again afterwards, graceful, unforced.
    pub fn rolling() -> Self {
        Self::default()
    }
}

/// Reply to a restart command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartReply {
    /// Raw return code; anything `<= 0` is a rejection.
    pub code: i32,
    /// The endpoint dropped the management session while handling the command.
    pub disconnected: bool,
}

impl RestartReply {
    pub fn accepted(&self) -> bool {
        self.code > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Timeout,
}

/// A live handle to the cluster management endpoint.
#[async_trait]
pub trait Session: Send {
    /// Wait for the given nodes (or the whole cluster when empty) to report started.
    async fn wait_until_ready(
        &mut self,
        node_ids: &[NodeId],
        timeout: Duration,
    ) -> anyhow::Result<Readiness>;

    /// Fetch the current status of every node.
    async fn cluster_status(&mut self) -> anyhow::Result<ClusterSnapshot>;

    /// Ask the endpoint to restart one node.
    async fn restart_node(
        &mut self,
        node_id: NodeId,
        flags: RestartFlags,
    ) -> anyhow::Result<RestartReply>;

    /// Diagnostic state dump for a node.
    async fn dump_state(&mut self, node_id: NodeId) -> anyhow::Result<String>;

    /// Release everything held by the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Builds sessions against a management endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        retries: u32,
        retry_delay: Duration,
    ) -> anyhow::Result<Box<dyn Session>>;

    /// Backend name for display.
    fn name(&self) -> &str;
}
