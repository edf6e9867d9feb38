#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod extract;
pub mod gate;
pub mod models;
pub mod poll;
pub mod providers;
pub mod store;
pub mod telemetry;

pub use errors::Error;
