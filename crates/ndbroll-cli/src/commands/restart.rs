use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use ndbroll_core::config::RollingSettings;
use ndbroll_core::scheduler::RestartPlan;
use ndbroll_core::types::Node;
use ndbroll_mgm::factory::create_connector;
use ndbroll_restart::{ClusterSummary, RestartObserver, rolling_restart};

/// Prints the starting state and drives a progress bar across the plan.
struct Progress {
    pb: ProgressBar,
}

impl Progress {
    fn new() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }
}

impl RestartObserver for Progress {
    fn run_started(&mut self, before: &ClusterSummary, plan: &RestartPlan) {
        println!("{before}\n");
        println!("Restart order: {:?}", plan.node_ids());

        self.pb = ProgressBar::new(plan.len() as u64);
        self.pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
    }

    fn node_started(&mut self, node: &Node, _index: usize, _total: usize) {
        self.pb
            .set_message(format!("node {} (group {})", node.node_id, node.group_id));
    }

    fn node_restarted(&mut self, _node: &Node, _index: usize, _total: usize) {
        self.pb.inc(1);
    }
}

pub async fn run(settings: &RollingSettings) -> Result<()> {
    let connector = create_connector(&settings.connect_string)?;
    println!(
        "Rolling restart of '{}' ({} backend)",
        settings.connect_string,
        connector.name()
    );
    if !settings.wait_after_restart {
        println!("WARN: not waiting for nodes to rejoin; a whole group may go down.");
    }

    let mut progress = Progress::new();
    let outcome = rolling_restart(connector, settings, &mut progress).await;
    progress.pb.finish_with_message("done");
    let outcome = outcome?;

    println!("\n{}\n", outcome.after);

    let result = &outcome.result;
    let elapsed = result.finished_at - result.started_at;
    println!("Rolling restart completed:");
    println!("  Nodes restarted:    {}", result.restarted_count);
    println!("  Reconnects:         {}", result.reconnects);
    println!(
        "  Recovered errors:   {}",
        result.errors.len() + result.errors_dropped
    );
    println!("  Elapsed:            {}s", elapsed.num_seconds());
    if !result.errors.is_empty() {
        if result.errors_dropped > 0 {
            println!("\n  Recovered (last {}):", result.errors.len());
        } else {
            println!("\n  Recovered:");
        }
        for e in &result.errors {
            println!("    - {e}");
        }
    }
    if !outcome.after.all_online() {
        println!(
            "\nWARN: {} node(s) still offline after the run",
            outcome.after.offline
        );
    }

    Ok(())
}
