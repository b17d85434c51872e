//! Finalization: naming, conversion, merging, cleanup

pub mod finalizer;
pub mod paths;

pub use finalizer::Finalizer;
pub use paths::{destination_dir, resolve_unique_path, sanitize_file_name};
