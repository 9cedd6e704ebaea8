//! Utilities shared by the Easel packages.

pub mod logger;
