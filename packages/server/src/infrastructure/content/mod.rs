//! ContentGenerator の実装
//!
//! - `openai`: OpenAI API（chat completions / image generations）
//! - `stock`: API キーなしで動く組み込みのお題とプレースホルダー画像

pub mod openai;
pub mod stock;

pub use openai::OpenAiContentGenerator;
pub use stock::StockContentGenerator;
