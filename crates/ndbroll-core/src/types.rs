use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable node identifier assigned by the cluster.
pub type NodeId = u32;

/// Replication group identifier.
pub type GroupId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Data node; the only kind a rolling restart touches.
    #[default]
    #[serde(alias = "ndb", alias = "ndbd")]
    Data,
    /// Management server.
    #[serde(alias = "ndb_mgmd")]
    Mgm,
    /// API / SQL node.
    #[serde(alias = "mysqld")]
    Api,
    Unknown,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Data => write!(f, "NDB"),
            NodeType::Mgm => write!(f, "MGM"),
            NodeType::Api => write!(f, "API"),
            NodeType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Started,
    Starting,
    Restarting,
    Stopping,
    ShuttingDown,
    SingleUser,
    Resuming,
    NoContact,
    Connected,
    Unknown,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Started => "STARTED",
            NodeStatus::Starting => "STARTING",
            NodeStatus::Restarting => "RESTARTING",
            NodeStatus::Stopping => "STOPPING",
            NodeStatus::ShuttingDown => "SHUTTING_DOWN",
            NodeStatus::SingleUser => "SINGLEUSER",
            NodeStatus::Resuming => "RESUMING",
            NodeStatus::NoContact => "NO_CONTACT",
            NodeStatus::Connected => "CONNECTED",
            NodeStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// One status entry as reported by the management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: NodeId,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub start_phase: u32,
    #[serde(default)]
    pub dynamic_id: u32,
    pub node_group: GroupId,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub connect_count: u32,
    #[serde(default)]
    pub connect_address: String,
}

impl NodeState {
    /// A started data node with no further detail.
    pub fn data(node_id: NodeId, node_group: GroupId) -> Self {
        Self {
            node_id,
            node_type: NodeType::Data,
            status: NodeStatus::Started,
            start_phase: 0,
            dynamic_id: node_id,
            node_group,
            version: String::new(),
            connect_count: 0,
            connect_address: String::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Started
    }

    /// Data nodes, plus nodes the endpoint could not classify.
    pub fn is_restartable(&self) -> bool {
        matches!(self.node_type, NodeType::Data | NodeType::Unknown)
    }
}

/// Point-in-time view of the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster_name: String,
    pub nodes: Vec<NodeState>,
}

impl ClusterSnapshot {
    pub fn new(cluster_name: impl Into<String>, nodes: Vec<NodeState>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            nodes,
        }
    }

    /// Restart candidates, in the order the endpoint enumerated them.
    pub fn restartable_nodes(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|n| n.is_restartable())
            .map(|n| Node::new(n.node_id, n.node_group))
            .collect()
    }

    pub fn node(&self, node_id: NodeId) -> Option<&NodeState> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn online_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_online()).count()
    }

    pub fn offline_count(&self) -> usize {
        self.nodes.len() - self.online_count()
    }
}

/// Restart bookkeeping for a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub group_id: GroupId,
    restarted: bool,
}

impl Node {
    pub fn new(node_id: NodeId, group_id: GroupId) -> Self {
        Self {
            node_id,
            group_id,
            restarted: false,
        }
    }

    pub fn restarted(&self) -> bool {
        self.restarted
    }

    /// Flip to restarted. There is no way back.
    pub fn mark_restarted(&mut self) {
        self.restarted = true;
    }
}
