//! buzzscan - keyword analysis for batches of PDF reports.
//!
//! Documents live in an in-memory [`registry::DocumentRegistry`] for the
//! length of a session. The [`services::AnalysisService`] sends them to a
//! remote analysis service and settles each one independently, discarding
//! results that arrive after the document was removed or restarted.

pub mod cli;
pub mod config;
pub mod http_client;
pub mod keywords;
pub mod models;
pub mod registry;
pub mod services;
