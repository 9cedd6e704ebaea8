//! Data Transfer Objects (DTOs).
//!
//! - `http`: HTTP API response DTOs
//! - `conversion`: Domain Model → DTO 変換

pub mod conversion;
pub mod http;
