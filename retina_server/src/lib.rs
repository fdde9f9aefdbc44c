mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod upload;

pub use app::start_app;
pub use server::{build_router, SharedState};
