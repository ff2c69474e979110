pub mod events;
pub mod executor;
pub mod graph;
pub mod handlers;
pub mod runner;
pub mod templating;

pub use runner::{execute_run, ExecutorError};
