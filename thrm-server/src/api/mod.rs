//! REST API for the theremin dashboard

pub mod handlers;
pub mod server;

pub use server::{build_router, run, AppContext};
