use anyhow::Result;
use std::path::Path;

use ndbroll_core::config::RollingSettings;

pub fn run(config_path: &Path, settings: &RollingSettings) -> Result<()> {
    if config_path.exists() {
        println!("Config: {}", config_path.display());
    } else {
        println!("Config: {} (not found, using defaults)", config_path.display());
    }
    println!();
    println!("  Connection string:   {}", display_or_unset(&settings.connect_string));
    println!("  Wait seconds:        {}", settings.wait_seconds);
    println!("  Wait after restart:  {}", settings.wait_after_restart);
    println!("  Connect retries:     {}", settings.connect_retries);
    match settings.max_reconnect_attempts {
        Some(n) => println!("  Max reconnects:      {n}"),
        None => println!("  Max reconnects:      unlimited"),
    }
    println!("  Verbose:             {}", settings.verbose);

    if settings.connect_string.is_empty() {
        println!();
        println!("  Set a connection string in {}:", config_path.display());
        println!("  [ndbroll]");
        println!("  connect_string = \"sim:/path/to/cluster.toml\"");
        println!("  wait_seconds = 30");
    }

    Ok(())
}

fn display_or_unset(s: &str) -> &str {
    if s.is_empty() { "(unset)" } else { s }
}
