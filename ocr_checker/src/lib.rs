mod error;
mod page;
mod routes;
mod server;

pub mod app;
pub mod config;

pub use app::start_app;
