//! HTTP surface

pub mod server;

pub use server::{create_router, AppState};
