//! Easel game server library.
//!
//! Room coordination for a prompt-and-paint party game: client actors, per-room
//! coordinators driving a ready-count barrier, a relay bus between server processes
//! and a shared state store.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
