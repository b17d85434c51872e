//! Final artifact naming
//!
//! Destination resolution, filename sanitization, and the sequential
//! unique-path probe.

use std::path::{Path, PathBuf};

use crate::backend::storage::StorageBackend;
use crate::config::DestinationStrategy;
use crate::error::{RecorderError, RecorderResult};

/// Characters stripped from file name stems
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];

/// Strip forbidden filesystem characters from a file name stem
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Recording".to_string()
    } else {
        cleaned
    }
}

/// Resolve the destination directory from the configured strategy.
///
/// Document-relative destinations need the caller's active document
/// directory; without one the destination cannot be resolved.
pub fn destination_dir(
    strategy: &DestinationStrategy,
    document_dir: Option<&Path>,
) -> RecorderResult<PathBuf> {
    match strategy {
        DestinationStrategy::FixedFolder { path } => Ok(path.clone()),
        DestinationStrategy::DocumentRelative { subfolder } => {
            let base = document_dir.ok_or_else(|| {
                RecorderError::InvalidState(
                    "document-relative destination requires an active document".to_string(),
                )
            })?;
            Ok(match subfolder {
                Some(sub) => base.join(sub),
                None => base.to_path_buf(),
            })
        }
    }
}

/// Find a non-colliding path `dir/stem.ext`, appending `_1`, `_2`, ... to the
/// stem until the path is free.
///
/// The destination directory is created if missing. The probe is a
/// sequential existence check, not an atomic reservation; a race against an
/// external concurrent writer is an accepted limitation.
pub async fn resolve_unique_path(
    storage: &dyn StorageBackend,
    dir: &Path,
    stem: &str,
    extension: &str,
) -> RecorderResult<PathBuf> {
    let stem = sanitize_file_name(stem);

    if !storage
        .exists(dir)
        .await
        .map_err(|e| RecorderError::persistence(dir, e))?
    {
        storage
            .create_folder(dir)
            .await
            .map_err(|e| RecorderError::persistence(dir, e))?;
    }

    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{stem}.{extension}")
        } else {
            format!("{stem}_{suffix}.{extension}")
        };
        let candidate = dir.join(name);
        let taken = storage
            .exists(&candidate)
            .await
            .map_err(|e| RecorderError::persistence(&candidate, e))?;
        if !taken {
            return Ok(candidate);
        }
        suffix += 1;
    }
}
