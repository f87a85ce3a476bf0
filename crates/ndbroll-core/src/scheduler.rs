use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::{Result, RollingError};
use crate::groups::GroupSet;
use crate::types::{ClusterSnapshot, GroupId, Node, NodeId};

/// Group-fair restart order. The order is fixed at construction; only the
/// per-node bookkeeping can be touched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartPlan {
    nodes: Vec<Node>,
}

impl RestartPlan {
    /// Plan a restart of every restartable node in `snapshot`.
    pub fn for_snapshot(snapshot: &ClusterSnapshot) -> Result<Self> {
        schedule(snapshot.restartable_nodes())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.node_id).collect()
    }

    pub fn restarted_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.restarted()).count()
    }

    /// True when no two adjacent entries share a group while some other
    /// group still has nodes left to restart.
    pub fn is_group_fair(&self) -> bool {
        let mut remaining: HashSet<GroupId> = HashSet::new();
        for i in (1..self.nodes.len()).rev() {
            remaining.insert(self.nodes[i].group_id);
            if self.nodes[i - 1].group_id == self.nodes[i].group_id && remaining.len() > 1 {
                return false;
            }
        }
        true
    }
}

/// Round-robin over groups in ascending id order, taking nodes from each
/// group in the order they were enumerated. Groups drop out of the rotation
/// once exhausted.
pub fn schedule(nodes: Vec<Node>) -> Result<RestartPlan> {
    if nodes.is_empty() {
        return Err(RollingError::EmptyCluster);
    }
    let total = nodes.len();

    let mut groups: GroupSet = nodes.iter().map(|n| n.group_id).collect();
    let mut queues: Vec<VecDeque<Node>> = vec![VecDeque::new(); groups.len()];
    for node in nodes {
        if let Some(idx) = groups.position(node.group_id) {
            queues[idx].push_back(node);
        }
    }

    let mut plan = Vec::with_capacity(total);
    let mut cursor = 0;
    while plan.len() < total && !groups.is_empty() {
        match queues[cursor].pop_front() {
            Some(node) => {
                plan.push(node);
                cursor = (cursor + 1) % groups.len();
            }
            None => {
                let exhausted = groups.remove_at(cursor);
                queues.remove(cursor);
                tracing::trace!(group = exhausted, "group exhausted");
                if !groups.is_empty() {
                    cursor %= groups.len();
                }
            }
        }
    }

    Ok(RestartPlan { nodes: plan })
}
