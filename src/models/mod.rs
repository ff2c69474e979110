pub mod automation;
pub mod run;
pub mod run_event;
