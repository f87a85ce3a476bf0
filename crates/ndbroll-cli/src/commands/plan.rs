use anyhow::Result;

use ndbroll_core::config::RollingSettings;
use ndbroll_core::scheduler::RestartPlan;
use ndbroll_mgm::factory::create_connector;
use ndbroll_restart::ConnectionSupervisor;

pub async fn run(settings: &RollingSettings, json: bool) -> Result<()> {
    let connector = create_connector(&settings.connect_string)?;
    let mut supervisor = ConnectionSupervisor::connect(connector, settings).await?;
    let snapshot = supervisor.refresh_status().await;
    supervisor.shutdown().await;

    let plan = RestartPlan::for_snapshot(&snapshot?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print!("{}", render(&plan));
    Ok(())
}

fn render(plan: &RestartPlan) -> String {
    let mut out = format!("{:<6} {:<8} {:<6}\n", "STEP", "NODE", "GROUP");
    out.push_str(&"-".repeat(22));
    out.push('\n');
    for (i, node) in plan.iter().enumerate() {
        out.push_str(&format!(
            "{:<6} {:<8} {:<6}\n",
            i + 1,
            node.node_id,
            node.group_id
        ));
    }
    out.push_str(&format!(
        "\n{} node(s), group-fair: {}\n",
        plan.len(),
        if plan.is_group_fair() { "yes" } else { "no" }
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndbroll_core::types::{ClusterSnapshot, NodeState};

    #[test]
    fn renders_one_row_per_node() {
        let snapshot = ClusterSnapshot::new(
            "t",
            vec![NodeState::data(1, 0), NodeState::data(2, 0), NodeState::data(3, 1)],
        );
        let plan = RestartPlan::for_snapshot(&snapshot).unwrap();
        let text = render(&plan);
        let rows: Vec<&str> = text.lines().skip(2).take(3).collect();
        assert!(rows[0].starts_with("1      1 "));
        assert!(rows[1].starts_with("2      3 "));
        assert!(rows[2].starts_with("3      2 "));
        assert!(text.contains("3 node(s), group-fair: yes"));
    }
}
