//! Media type classification and body encoding.

pub mod codec;
mod format;

pub use format::{ContentEncoding, MediaFormat};
