pub mod config;
pub mod error;
pub mod groups;
pub mod scheduler;
pub mod types;
