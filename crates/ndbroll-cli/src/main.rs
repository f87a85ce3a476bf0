mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ndbroll_core::config::{RollingConfig, RollingSettings};

#[derive(Parser)]
#[command(name = "ndbroll")]
#[command(about = "Group-fair rolling restart of a replicated cluster")]
#[command(version)]
struct Cli {
    /// Path to the ndbroll config directory (default: ~/.ndbroll)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Management connection string, e.g. `sim:cluster.toml`
    #[arg(
        short = 'c',
        long = "connection_string",
        global = true,
        env = "NDB_CONNECTSTRING"
    )]
    connection_string: Option<String>,

    /// Poll interval, readiness timeout and reconnect delay in seconds [default: 30]
    #[arg(short = 'w', long = "wait_seconds", global = true)]
    wait_seconds: Option<u64>,

    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,

    /// Move on to the next node without waiting for the restarted one to rejoin
    #[arg(long, global = true)]
    no_wait_after_restart: bool,

    /// Give up after this many consecutive reconnect attempts (default: never)
    #[arg(long, global = true)]
    max_reconnects: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Restart every data node, one at a time (default)
    Restart,

    /// Show the cluster status
    Status,

    /// Show the restart order without restarting anything
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

impl Cli {
    /// Config file values, overridden by whatever was given on the command line.
    fn settings(&self, file: RollingConfig) -> RollingSettings {
        let mut settings = file.ndbroll;
        if let Some(ref cs) = self.connection_string {
            settings.connect_string = cs.clone();
        }
        if let Some(secs) = self.wait_seconds {
            settings.wait_seconds = secs;
        }
        if self.verbose {
            settings.verbose = true;
        }
        if self.no_wait_after_restart {
            settings.wait_after_restart = false;
        }
        if self.max_reconnects.is_some() {
            settings.max_reconnect_attempts = self.max_reconnects;
        }
        settings
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => RollingConfig::default_base_dir()?,
    };
    let config_path = RollingConfig::default_path(&base_dir);
    let settings = cli.settings(RollingConfig::load_or_default(&config_path)?);

    let level = if settings.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ndbroll={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(
        "settings from {} and command line: {:?}",
        config_path.display(),
        settings
    );

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command.unwrap_or(Commands::Restart) {
        Commands::Restart => rt.block_on(commands::restart::run(&settings)),
        Commands::Status => rt.block_on(commands::status::run(&settings)),
        Commands::Plan { json } => rt.block_on(commands::plan::run(&settings, json)),
        Commands::Config => commands::config::run(&config_path, &settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ndbroll").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_come_from_config() {
        let cli = parse(&[]);
        let settings = cli.settings(RollingConfig::default());
        assert_eq!(settings.wait_seconds, 30);
        assert!(settings.wait_after_restart);
        assert!(cli.command.is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "-c",
            "sim:lab.toml",
            "--wait_seconds",
            "5",
            "--verbose",
            "--no-wait-after-restart",
            "--max-reconnects",
            "7",
            "status",
        ]);
        let mut file = RollingConfig::default();
        file.ndbroll.connect_string = "sim:other.toml".into();
        let settings = cli.settings(file);
        assert_eq!(settings.connect_string, "sim:lab.toml");
        assert_eq!(settings.wait_seconds, 5);
        assert!(settings.verbose);
        assert!(!settings.wait_after_restart);
        assert_eq!(settings.max_reconnect_attempts, Some(7));
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn config_file_value_survives_missing_flag() {
        let cli = parse(&["plan", "--json"]);
        let mut file = RollingConfig::default();
        file.ndbroll.max_reconnect_attempts = Some(3);
        file.ndbroll.wait_seconds = 12;
        let settings = cli.settings(file);
        assert_eq!(settings.max_reconnect_attempts, Some(3));
        assert_eq!(settings.wait_seconds, 12);
        assert!(matches!(cli.command, Some(Commands::Plan { json: true })));
    }

    #[test]
    fn rejects_non_numeric_wait() {
        let result = Cli::try_parse_from(["ndbroll", "--wait_seconds", "soon"]);
        assert!(result.is_err());
    }
}
