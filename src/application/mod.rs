pub mod bootstrap;
pub mod repair_loop;

pub use bootstrap::build_job_service;
pub use repair_loop::{RepairController, RepairSettings, RESULTS_FILE};
