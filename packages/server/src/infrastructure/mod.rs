//! Infrastructure layer.
//!
//! Domain 層が定義する trait（StateStore / RelayBus / ContentGenerator / FragmentRenderer）
//! の具体的な実装と、HTTP API の DTO を提供します。

pub mod content;
pub mod dto;
pub mod relay;
pub mod renderer;
pub mod store;
