//! Owns the management session and hides transient failures from the driver.
//!
//! Every operation runs in the same loop: try it on the live session, and on
//! a timeout, transport error or dropped session tear everything down, sleep
//! `wait_seconds`, build a fresh session and try again. Without a configured
//! `max_reconnect_attempts` the loop never gives up.

use std::collections::VecDeque;
use std::time::Duration;

use ndbroll_core::config::RollingSettings;
use ndbroll_core::error::{Result, RollingError};
use ndbroll_core::types::{ClusterSnapshot, NodeId};
use ndbroll_mgm::session::{Connector, Readiness, RestartFlags, Session};

pub struct ConnectionSupervisor {
    connector: Box<dyn Connector>,
    endpoint: String,
    wait: Duration,
    connect_retries: u32,
    max_reconnect_attempts: Option<u32>,
    session: Option<Box<dyn Session>>,
    snapshot: Option<ClusterSnapshot>,
    reconnects: u32,
    recovered: VecDeque<RollingError>,
    recovered_dropped: usize,
}

/// Recovered errors kept for the run report; older ones are only counted.
pub const RECOVERED_CAPACITY: usize = 64;

impl ConnectionSupervisor {
    /// Build the first session. Failure here is fatal for the run.
    pub async fn connect(
        connector: Box<dyn Connector>,
        settings: &RollingSettings,
    ) -> Result<Self> {
        let mut supervisor = Self {
            connector,
            endpoint: settings.connect_string.clone(),
            wait: settings.wait_interval(),
            connect_retries: settings.connect_retries,
            max_reconnect_attempts: settings.max_reconnect_attempts,
            session: None,
            snapshot: None,
            reconnects: 0,
            recovered: VecDeque::new(),
            recovered_dropped: 0,
        };
        if let Err(e) = supervisor.open_session().await {
            tracing::error!("error connecting to '{}': {e:#}", supervisor.endpoint);
            return Err(RollingError::SessionInit(format!("{e:#}")));
        }
        Ok(supervisor)
    }

    /// Last cluster status fetched on (re)connect or by [`Self::refresh_status`].
    pub fn snapshot(&self) -> Option<&ClusterSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Drain the errors recovered from since the last call, oldest first.
    /// At most [`RECOVERED_CAPACITY`] of the most recent are kept.
    pub fn take_recovered(&mut self) -> Vec<RollingError> {
        self.recovered.drain(..).collect()
    }

    /// Recovered errors that fell out of the kept window since the last call.
    pub fn take_recovered_dropped(&mut self) -> usize {
        std::mem::take(&mut self.recovered_dropped)
    }

    /// Block until `node_id` reports started.
    pub async fn ensure_online(&mut self, node_id: NodeId) -> Result<()> {
        let mut attempts = 0;
        loop {
            tracing::info!(
                "wait_until_ready node {node_id} timeout: {}s",
                self.wait.as_secs()
            );
            let wait = self.wait;
            let outcome = match self.session.as_mut() {
                Some(session) => session.wait_until_ready(&[node_id], wait).await,
                None => Err(anyhow::anyhow!("no live management session")),
            };
            let err = match outcome {
                Ok(Readiness::Ready) => return Ok(()),
                Ok(Readiness::Timeout) => RollingError::TransientConnection(format!(
                    "node {node_id} not ready within {}s",
                    wait.as_secs()
                )),
                Err(e) => RollingError::TransientConnection(format!("{e:#}")),
            };
            self.recover(err, &mut attempts).await?;
        }
    }

    /// Send a rolling restart for `node_id`, retrying until it is accepted.
    ///
    /// If the endpoint accepted the restart but the session could not be
    /// rebuilt afterwards, the error is [`RollingError::ReconnectAfterRestart`]
    /// so callers know the node did restart.
    pub async fn issue_restart(&mut self, node_id: NodeId) -> Result<()> {
        let mut attempts = 0;
        loop {
            tracing::info!("restart node {node_id}");
            let outcome = match self.session.as_mut() {
                Some(session) => session.restart_node(node_id, RestartFlags::rolling()).await,
                None => Err(anyhow::anyhow!("no live management session")),
            };
            let err = match outcome {
                Ok(reply) if reply.accepted() => {
                    if reply.disconnected {
                        let err = RollingError::TransientConnection(format!(
                            "management session dropped by restart of node {node_id}"
                        ));
                        return self.recover(err, &mut attempts).await.map_err(|e| {
                            RollingError::ReconnectAfterRestart {
                                node_id,
                                source: Box::new(e),
                            }
                        });
                    }
                    return Ok(());
                }
                Ok(reply) => RollingError::RestartRejected {
                    node_id,
                    code: reply.code,
                },
                Err(e) => RollingError::TransientConnection(format!("{e:#}")),
            };
            self.recover(err, &mut attempts).await?;
        }
    }

    /// Fetch and remember the current cluster status.
    pub async fn refresh_status(&mut self) -> Result<ClusterSnapshot> {
        let mut attempts = 0;
        loop {
            let outcome = match self.session.as_mut() {
                Some(session) => session.cluster_status().await,
                None => Err(anyhow::anyhow!("no live management session")),
            };
            match outcome {
                Ok(snapshot) => {
                    self.snapshot = Some(snapshot.clone());
                    return Ok(snapshot);
                }
                Err(e) => {
                    let err = RollingError::TransientConnection(format!("{e:#}"));
                    self.recover(err, &mut attempts).await?;
                }
            }
        }
    }

    /// Diagnostic state for a node. Best effort: never reconnects.
    pub async fn dump_state(&mut self, node_id: NodeId) -> String {
        match self.session.as_mut() {
            Some(session) => match session.dump_state(node_id).await {
                Ok(state) => state,
                Err(e) => format!("error: {e}"),
            },
            None => "error: not connected".to_string(),
        }
    }

    /// Close the session for good.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    async fn recover(&mut self, err: RollingError, attempts: &mut u32) -> Result<()> {
        tracing::warn!("{err}");
        self.record(err);
        self.reconnect(attempts).await
    }

    /// Tear down and rebuild the session until one sticks.
    async fn reconnect(&mut self, attempts: &mut u32) -> Result<()> {
        loop {
            if let Some(max) = self.max_reconnect_attempts {
                if *attempts >= max {
                    tracing::error!("giving up after {attempts} reconnect attempts");
                    return Err(RollingError::RetriesExhausted {
                        attempts: *attempts,
                    });
                }
            }
            *attempts += 1;
            self.reconnects += 1;

            self.teardown().await;
            tracing::info!("sleep({}) before reconnect", self.wait.as_secs());
            tokio::time::sleep(self.wait).await;

            match self.open_session().await {
                Ok(()) => {
                    tracing::info!("reconnected to '{}'", self.endpoint);
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!("could not reconnect to '{}': {e:#}", self.endpoint);
                    self.record(RollingError::TransientConnection(format!("{e:#}")));
                }
            }
        }
    }

    fn record(&mut self, err: RollingError) {
        if self.recovered.len() == RECOVERED_CAPACITY {
            self.recovered.pop_front();
            self.recovered_dropped += 1;
        }
        self.recovered.push_back(err);
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.snapshot = None;
    }

    /// Connect, wait for the cluster, fetch its status. A partially built
    /// session is closed before the error is returned.
    async fn open_session(&mut self) -> anyhow::Result<()> {
        let mut session = self
            .connector
            .connect(&self.endpoint, self.connect_retries, self.wait)
            .await?;

        let ready = match session.wait_until_ready(&[], self.wait).await {
            Ok(ready) => ready,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        if ready == Readiness::Timeout {
            session.close().await;
            anyhow::bail!("cluster was not ready within {} seconds", self.wait.as_secs());
        }

        let snapshot = match session.cluster_status().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        tracing::debug!(
            cluster = %snapshot.cluster_name,
            nodes = snapshot.nodes.len(),
            "management session ready"
        );
        self.session = Some(session);
        self.snapshot = Some(snapshot);
        Ok(())
    }
}
