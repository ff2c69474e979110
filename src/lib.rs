pub mod config;
pub mod db;
pub mod engine;
pub mod flow;
pub mod models;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;
pub mod stream;
pub mod utils;
pub mod worker;

pub use state::AppState;
