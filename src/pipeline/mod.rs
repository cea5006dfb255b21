// Import pipeline: decode, batch, project, write

pub mod batch;
pub mod decoder;
pub mod importer;
pub mod project;
pub mod writer;

// Re-export the entry points most callers want
pub use importer::{import_file, run_import};
pub use writer::{BatchSink, TripWriter};
