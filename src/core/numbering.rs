//! Scan number allocation
//!
//! Numbers only need to be unique within the output folder for a given
//! pattern and date. The allocator looks at what is already on disk so a
//! restarted session continues after the last scan instead of overwriting it.

use crate::core::error::Result;
use crate::core::naming::FilenamePattern;
use chrono::{DateTime, Local};
use log::trace;
use std::path::Path;
use walkdir::WalkDir;

/// Computes the next unused scan number for a folder
pub trait ScanNumberAllocator {
    /// Next number strictly greater than `last` and than any number on disk
    fn next_scan_number(
        &self,
        folder: &Path,
        last: u64,
        pattern: &FilenamePattern,
        at: &DateTime<Local>,
    ) -> Result<u64>;
}

/// Allocator that inspects the files directly inside the output folder
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryScanNumberAllocator;

impl DirectoryScanNumberAllocator {
    /// Highest scan number present in `folder`, if any
    pub fn highest_on_disk(
        folder: &Path,
        pattern: &FilenamePattern,
        at: &DateTime<Local>,
    ) -> Result<Option<u64>> {
        if !folder.exists() {
            return Ok(None);
        }

        let mut highest = None;
        for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                crate::core::error::ScanError::IoError(format!(
                    "Failed to list '{}': {}",
                    folder.display(),
                    e
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if let Some(number) = pattern.parse_number(&name, at) {
                trace!("Existing scan {} -> #{}", name, number);
                highest = highest.max(Some(number));
            }
        }

        Ok(highest)
    }
}

impl ScanNumberAllocator for DirectoryScanNumberAllocator {
    fn next_scan_number(
        &self,
        folder: &Path,
        last: u64,
        pattern: &FilenamePattern,
        at: &DateTime<Local>,
    ) -> Result<u64> {
        let on_disk = Self::highest_on_disk(folder, pattern, at)?.unwrap_or(0);
        Ok(last.max(on_disk) + 1)
    }
}
