//! Data models for documents and their analysis results.

mod analysis;
mod document;

pub use analysis::*;
pub use document::*;
