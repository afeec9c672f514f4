pub mod maintenance;
pub mod run_cycle;
pub mod status;
