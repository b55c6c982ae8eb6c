pub mod scheduler;

pub use scheduler::PurgeScheduler;
