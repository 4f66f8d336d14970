pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod dump;
pub mod restore;
pub mod state;

pub use document::{Document, FieldMode};
pub use dump::{DumpError, DumpRequest, DumpSummary, Dumper};
pub use restore::{RestoreError, RestoreSummary, Restorer};
pub use state::RunState;
