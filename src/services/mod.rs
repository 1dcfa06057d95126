//! Service layer for buzzscan.
//!
//! Services hold no document state of their own; they read and write through
//! the [`crate::registry::DocumentRegistry`]. They can be driven by the CLI or
//! embedded in other front ends.

pub mod analysis;
pub mod library;
pub mod navigator;
pub mod progress;

pub use analysis::{
    AnalysisBackend, AnalysisError, AnalysisEvent, AnalysisRequest, AnalysisService,
    AttemptOutcome, BatchSummary, DispatchError, DispatchMode, DispatchOptions, WordBudget,
};
pub use library::{LibraryClient, LibraryError, LibraryItem, LibraryListing};
pub use navigator::{NavigationTarget, ViewerNavigator};
pub use progress::{ProgressConfig, ProgressSimulator};
