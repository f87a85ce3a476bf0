use anyhow::Result;

use ndbroll_core::config::RollingSettings;
use ndbroll_mgm::factory::create_connector;
use ndbroll_restart::{ClusterSummary, ConnectionSupervisor};

pub async fn run(settings: &RollingSettings) -> Result<()> {
    let connector = create_connector(&settings.connect_string)?;
    let mut supervisor = ConnectionSupervisor::connect(connector, settings).await?;

    let summary = ClusterSummary::collect(&mut supervisor).await;
    supervisor.shutdown().await;
    let summary = summary?;

    println!("{summary}");
    if !summary.all_online() {
        println!(
            "\n{} node(s) offline. Bring them back before a rolling restart.",
            summary.offline
        );
    }

    Ok(())
}
