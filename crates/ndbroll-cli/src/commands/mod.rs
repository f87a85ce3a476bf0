pub mod config;
pub mod plan;
pub mod restart;
pub mod status;
