pub mod driver;
pub mod report;
pub mod supervisor;

pub use driver::{
    NoopObserver, RestartDriver, RestartObserver, RollingOutcome, RunResult, rolling_restart,
};
pub use report::ClusterSummary;
pub use supervisor::ConnectionSupervisor;
