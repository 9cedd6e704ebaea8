//! HTTP / WebSocket surface of the Easel server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
