//! FragmentRenderer の実装

pub mod html;

pub use html::HtmlFragmentRenderer;
