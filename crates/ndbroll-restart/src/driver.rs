use chrono::{DateTime, Utc};

use ndbroll_core::config::RollingSettings;
use ndbroll_core::error::{Result, RollingError};
use ndbroll_core::scheduler::RestartPlan;
use ndbroll_core::types::{Node, NodeId};
use ndbroll_mgm::session::Connector;

use crate::report::ClusterSummary;
use crate::supervisor::ConnectionSupervisor;

/// Progress callbacks for a run. All methods default to no-ops.
pub trait RestartObserver {
    /// The cluster was summarized and the plan built; nothing restarted yet.
    fn run_started(&mut self, _before: &ClusterSummary, _plan: &RestartPlan) {}

    /// About to work on `node`, the `index`-th of `total` plan entries.
    fn node_started(&mut self, _node: &Node, _index: usize, _total: usize) {}

    /// `node` is back and marked restarted.
    fn node_restarted(&mut self, _node: &Node, _index: usize, _total: usize) {}
}

pub struct NoopObserver;

impl RestartObserver for NoopObserver {}

/// Outcome of [`RestartDriver::run`].
#[derive(Debug)]
pub struct RunResult {
    pub restarted_count: usize,
    /// Node ids restarted by this run, in order.
    pub restarted: Vec<NodeId>,
    /// Plan entries already marked restarted when the run began.
    pub skipped: Vec<NodeId>,
    pub reconnects: u32,
    /// Failures the supervisor recovered from along the way, most recent last.
    pub errors: Vec<RollingError>,
    /// Recovered failures left out of `errors` to bound its size.
    pub errors_dropped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Walks a restart plan one node at a time.
pub struct RestartDriver {
    supervisor: ConnectionSupervisor,
    wait_after_restart: bool,
    interrupted: Option<RunResult>,
}

impl RestartDriver {
    pub fn new(supervisor: ConnectionSupervisor, settings: &RollingSettings) -> Self {
        Self {
            supervisor,
            wait_after_restart: settings.wait_after_restart,
            interrupted: None,
        }
    }

    pub fn into_supervisor(self) -> ConnectionSupervisor {
        self.supervisor
    }

    /// Progress of the last run that stopped early, if any.
    pub fn take_interrupted(&mut self) -> Option<RunResult> {
        self.interrupted.take()
    }

    /// Restart every pending node of `plan`, strictly in order.
    ///
    /// Only an exhausted reconnect ceiling stops the run early. Nodes whose
    /// restart the endpoint accepted keep their restarted flag, and the
    /// partial result stays available from [`Self::take_interrupted`].
    pub async fn run(
        &mut self,
        plan: &mut RestartPlan,
        observer: &mut dyn RestartObserver,
    ) -> Result<RunResult> {
        let reconnects_before = self.supervisor.reconnects();
        let mut result = RunResult {
            restarted_count: 0,
            restarted: Vec::with_capacity(plan.len()),
            skipped: Vec::new(),
            reconnects: 0,
            errors: Vec::new(),
            errors_dropped: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        self.interrupted = None;

        let walked = self.walk(plan, observer, &mut result).await;

        result.restarted_count = result.restarted.len();
        result.reconnects = self.supervisor.reconnects() - reconnects_before;
        result.errors = self.supervisor.take_recovered();
        result.errors_dropped = self.supervisor.take_recovered_dropped();
        result.finished_at = Utc::now();

        match walked {
            Ok(()) => Ok(result),
            Err(e) => {
                tracing::error!(
                    restarted = ?result.restarted,
                    recovered = result.errors.len() + result.errors_dropped,
                    "rolling restart stopped after {} node(s): {e}",
                    result.restarted_count
                );
                self.interrupted = Some(result);
                Err(e)
            }
        }
    }

    async fn walk(
        &mut self,
        plan: &mut RestartPlan,
        observer: &mut dyn RestartObserver,
        result: &mut RunResult,
    ) -> Result<()> {
        let total = plan.len();
        for (index, node) in plan.iter_mut().enumerate() {
            if node.restarted() {
                tracing::debug!("node {} already restarted, skipping", node.node_id);
                result.skipped.push(node.node_id);
                continue;
            }
            observer.node_started(node, index, total);
            tracing::info!(
                "restarting node {} (group {}) [{}/{}]",
                node.node_id,
                node.group_id,
                index + 1,
                total
            );

            self.supervisor.ensure_online(node.node_id).await?;
            let settled = match self.supervisor.issue_restart(node.node_id).await {
                Ok(()) if self.wait_after_restart => {
                    self.supervisor.ensure_online(node.node_id).await
                }
                Ok(()) => Ok(()),
                Err(RollingError::ReconnectAfterRestart { source, .. }) => Err(*source),
                Err(e) => return Err(e),
            };

            // Accepted restarts are never re-sent, even when the run stops here.
            node.mark_restarted();
            result.restarted.push(node.node_id);
            settled?;

            tracing::info!("restart node {} complete", node.node_id);
            observer.node_restarted(node, index, total);
        }
        Ok(())
    }
}

/// Everything an operator wants to see after a run.
#[derive(Debug)]
pub struct RollingOutcome {
    pub before: ClusterSummary,
    pub after: ClusterSummary,
    pub plan: RestartPlan,
    pub result: RunResult,
}

/// Connect, plan, restart every data node, and report the cluster state on
/// both ends of the run.
pub async fn rolling_restart(
    connector: Box<dyn Connector>,
    settings: &RollingSettings,
    observer: &mut dyn RestartObserver,
) -> Result<RollingOutcome> {
    let mut supervisor = ConnectionSupervisor::connect(connector, settings).await?;

    let before = match ClusterSummary::collect(&mut supervisor).await {
        Ok(summary) => summary,
        Err(e) => {
            supervisor.shutdown().await;
            return Err(e);
        }
    };
    tracing::info!(
        cluster = %before.cluster_name,
        nodes = before.total(),
        online = before.online,
        offline = before.offline,
        "cluster state before restart"
    );
    if !before.all_online() {
        tracing::warn!("{} node(s) offline before the rolling restart", before.offline);
    }

    let snapshot = supervisor.snapshot().cloned().unwrap_or_default();
    let mut plan = match RestartPlan::for_snapshot(&snapshot) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!("{e}");
            supervisor.shutdown().await;
            return Err(e);
        }
    };
    tracing::info!("restart order: {:?}", plan.node_ids());
    observer.run_started(&before, &plan);

    let mut driver = RestartDriver::new(supervisor, settings);
    let run = driver.run(&mut plan, observer).await;
    let mut supervisor = driver.into_supervisor();
    let result = match run {
        Ok(result) => result,
        Err(e) => {
            supervisor.shutdown().await;
            return Err(e);
        }
    };

    let after = ClusterSummary::collect(&mut supervisor).await;
    supervisor.shutdown().await;
    let after = after?;
    tracing::info!(
        restarted = result.restarted_count,
        reconnects = result.reconnects,
        online = after.online,
        offline = after.offline,
        "rolling restart complete"
    );

    Ok(RollingOutcome {
        before,
        after,
        plan,
        result,
    })
}
