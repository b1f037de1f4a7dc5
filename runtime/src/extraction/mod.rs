//! Rendered-text extraction from live browser sessions.

pub mod frames;
pub mod text;

pub use frames::FrameTextExtractor;
pub use text::{clean_text, merge_chunks};
