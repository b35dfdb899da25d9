//! Scan persistence
//!
//! Persisters turn a trigger into files in the output folder. Pages are
//! written to the temp folder first and moved into place once complete, so
//! the output folder never contains half-written scans.

use crate::core::error::{Result, ScanError};
use crate::core::naming::{document_file_name, page_file_name};
use crate::core::pdf::assemble_pdf;
use crate::core::session::{PersistRequest, SavedScan, ScanPersister};
use crate::core::settings::{AdfAutoScanConfig, ScanConfig};
use crate::device::adapters::AdfTrigger;
use crate::device::traits::{
    DeviceCapabilities, OutputFormat, ScanEvent, ScanJob, ScanSource, ScannedPage, ScannerClient,
};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Move a finished file from the temp folder into `folder`
///
/// Falls back to copy + remove when a rename is not possible (for example
/// across filesystems). Never overwrites an existing file.
pub fn move_into(source: &Path, folder: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| ScanError::store(source, "not a file path"))?;
    let target = folder.join(file_name);

    if target.exists() {
        return Err(ScanError::store(&target, "file already exists"));
    }

    if fs::rename(source, &target).is_err() {
        fs::copy(source, &target).map_err(|e| ScanError::store(&target, e))?;
        if let Err(e) = fs::remove_file(source) {
            warn!("Could not remove temp file {}: {}", source.display(), e);
        }
    }

    debug!("Stored {}", target.display());
    Ok(target)
}

fn write_temp(folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let path = folder.join(name);
    if let Err(e) = fs::write(&path, data) {
        discard(std::slice::from_ref(&path));
        return Err(ScanError::store(&path, e));
    }
    Ok(path)
}

/// Best-effort removal of files left behind by a failed scan
fn discard(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Stage pages in the temp folder; on failure nothing stays behind
fn stage(
    pages: &[ScannedPage],
    format: OutputFormat,
    resolution: u32,
    base: &str,
    temp: &Path,
) -> Result<Vec<PathBuf>> {
    match format {
        OutputFormat::Pdf => {
            let document = assemble_pdf(pages, resolution)?;
            Ok(vec![write_temp(temp, &document_file_name(base), &document)?])
        }
        OutputFormat::Jpeg => {
            let mut staged = Vec::with_capacity(pages.len());
            for page in pages {
                let name = page_file_name(base, page.index, pages.len());
                match write_temp(temp, &name, &page.data) {
                    Ok(path) => staged.push(path),
                    Err(e) => {
                        discard(&staged);
                        return Err(e);
                    }
                }
            }
            Ok(staged)
        }
    }
}

/// Write captured pages for one scan and move them to the output folder
pub fn store_pages(
    pages: &[ScannedPage],
    format: OutputFormat,
    resolution: u32,
    request: &PersistRequest<'_>,
) -> Result<SavedScan> {
    if pages.is_empty() {
        return Err(ScanError::EmptyScan {
            job: format!("#{}", request.number),
        });
    }

    let dirs = request.directories;
    let base = dirs.pattern.base_name(request.number, &request.at);

    let staged = stage(pages, format, resolution, &base, &dirs.temp)?;

    // Refuse before moving anything so a clash leaves the output untouched
    if let Some(clash) = staged
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| dirs.output.join(name))
        .find(|target| target.exists())
    {
        discard(&staged);
        return Err(ScanError::store(&clash, "file already exists"));
    }

    let mut files = Vec::with_capacity(staged.len());
    for path in &staged {
        match move_into(path, &dirs.output) {
            Ok(target) => files.push(target),
            Err(e) => {
                discard(&files);
                discard(&staged);
                return Err(e);
            }
        }
    }

    Ok(SavedScan {
        number: request.number,
        files,
        pages: pages.len(),
    })
}

/// Persister for push-mode scan events
///
/// Uses the source and format chosen on the device panel.
pub struct EventPersister<C: ScannerClient> {
    client: Arc<C>,
    capabilities: DeviceCapabilities,
    scan: ScanConfig,
}

impl<C: ScannerClient> EventPersister<C> {
    pub fn new(client: Arc<C>, capabilities: DeviceCapabilities, scan: ScanConfig) -> Self {
        Self {
            client,
            capabilities,
            scan,
        }
    }
}

impl<C: ScannerClient> ScanPersister<ScanEvent> for EventPersister<C> {
    fn persist(&mut self, event: ScanEvent, request: &PersistRequest<'_>) -> Result<SavedScan> {
        if !self.capabilities.supports_source(event.source) {
            return Err(ScanError::Unsupported(format!(
                "{} requested but not available on {}",
                event.source, self.capabilities.make_and_model
            )));
        }

        let job = ScanJob {
            source: event.source,
            color: event.color,
            resolution: self.scan.resolution,
            width: self.scan.width,
            height: self.scan.height,
        };
        let pages = self.client.scan(&job)?;
        store_pages(&pages, event.format, job.resolution, request)
    }
}

/// Persister for ADF auto-scan mode
///
/// Starts the capture itself once the feeder reports paper.
pub struct AdfPersister<C: ScannerClient> {
    client: Arc<C>,
    scan: ScanConfig,
    source: ScanSource,
    format: OutputFormat,
}

impl<C: ScannerClient> AdfPersister<C> {
    /// Fails when the device has no document feeder
    ///
    /// Duplex is downgraded to simplex when the feeder cannot do it.
    pub fn new(
        client: Arc<C>,
        capabilities: &DeviceCapabilities,
        scan: ScanConfig,
        adf: &AdfAutoScanConfig,
    ) -> Result<Self> {
        if !capabilities.has_adf {
            return Err(ScanError::Unsupported(format!(
                "{} has no document feeder",
                capabilities.make_and_model
            )));
        }

        let source = if adf.duplex && capabilities.supports_source(ScanSource::AdfDuplex) {
            ScanSource::AdfDuplex
        } else {
            if adf.duplex {
                warn!(
                    "{} cannot scan duplex, scanning one side only",
                    capabilities.make_and_model
                );
            }
            ScanSource::Adf
        };

        Ok(Self {
            client,
            scan,
            source,
            format: if adf.pdf {
                OutputFormat::Pdf
            } else {
                OutputFormat::Jpeg
            },
        })
    }

    pub fn source(&self) -> ScanSource {
        self.source
    }
}

impl<C: ScannerClient> ScanPersister<AdfTrigger> for AdfPersister<C> {
    fn persist(&mut self, trigger: AdfTrigger, request: &PersistRequest<'_>) -> Result<SavedScan> {
        debug!(
            "Scanning feeder batch detected at {}",
            trigger.detected_at.format("%H:%M:%S")
        );
        let job = ScanJob {
            source: self.source,
            color: self.scan.color,
            resolution: self.scan.resolution,
            width: self.scan.width,
            height: self.scan.height,
        };
        let pages = self.client.scan(&job)?;
        store_pages(&pages, self.format, job.resolution, request)
    }
}
