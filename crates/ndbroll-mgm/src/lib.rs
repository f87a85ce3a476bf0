pub mod factory;
pub mod session;
pub mod simulated;
