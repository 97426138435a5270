//! End-to-end "image tarball → delta tarball" orchestration.
//!
//! [`ImageDiffer`] runs the three forward passes in order:
//! 1. inventory the reference image's layers ([`crate::layers::inventory`]),
//! 2. intersect them with the comparison image's layers
//!    ([`crate::layers::shared_layers`]),
//! 3. stream the comparison image into the target, dropping every entry under a
//!    shared layer ([`crate::filter::copy_filtered`]).
//!
//! Each pass opens its input afresh; nothing is rewound and no entry content is
//! held in memory.

use crate::error::{DiffError, Result};
use crate::filter::{copy_filtered, CopyStats, ExclusionFilter, PrefixMatch};
use crate::inputs::DiffPaths;
use crate::layers::{self, LayerScope, LayerSet};
use crate::notifier::Notifier;
use std::io::{self, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;

/// Knobs for a diff run. The defaults reproduce the classic behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    pub prefix_match: PrefixMatch,
    pub layer_scope: LayerScope,
}

/// What a finished run did.
#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub reference_layers: usize,
    pub excluded: LayerSet,
    pub copy: CopyStats,
}

pub struct ImageDiffer {
    options: DiffOptions,
    notifier: Notifier,
}

impl ImageDiffer {
    pub fn new(options: DiffOptions, notifier: Notifier) -> Self {
        Self { options, notifier }
    }

    /// Writes to `paths.target` the entries of `paths.compare` that do not belong
    /// to a layer also present in `paths.reference`.
    ///
    /// Preconditions are not checked here; see [`DiffPaths::prepare`]. The output
    /// is staged in a temporary file beside the target and renamed into place
    /// only once its trailer is written, so a failed run never leaves a
    /// truncated tarball at the target path.
    ///
    /// # Errors
    /// - [`DiffError::Open`]/[`DiffError::Read`] when an input cannot be read.
    /// - [`DiffError::Format`] when an input is not a valid tar stream.
    /// - [`DiffError::Write`] when the output cannot be created, written or renamed.
    ///
    /// ### Examples
    /// ```no_run
    /// use layerdiff::{DiffOptions, DiffPaths, ImageDiffer, Notifier};
    ///
    /// let paths = DiffPaths::new("base.tar", "app.tar", "delta.tar");
    /// let differ = ImageDiffer::new(DiffOptions::default(), Notifier::new(1));
    /// let summary = differ.diff(&paths)?;
    /// println!("dropped {} shared layers", summary.excluded.len());
    /// # Ok::<(), layerdiff::DiffError>(())
    /// ```
    pub fn diff(&self, paths: &DiffPaths) -> Result<DiffSummary> {
        let scope = self.options.layer_scope;

        self.notifier.begin_pass("Scanning reference image layers");
        let reference = layers::inventory(&paths.reference, scope)?;
        log::info!(
            "Reference image {} has {} layers",
            paths.reference.display(),
            reference.len()
        );

        self.notifier.begin_pass("Resolving shared layers");
        let excluded = layers::shared_layers(&paths.compare, &reference, scope)?;
        for id in &excluded {
            log::info!("Excluding shared layer {}", id);
        }

        self.notifier.begin_pass("Copying unique entries");
        let filter = ExclusionFilter::new(excluded, self.options.prefix_match);
        let copy = self.write_target(paths, &filter)?;

        self.notifier.finish(&format!(
            "Wrote {} of {} entries to {} ({} skipped)",
            copy.entries_written,
            copy.entries_read,
            paths.target.display(),
            copy.entries_skipped
        ));

        Ok(DiffSummary {
            reference_layers: reference.len(),
            excluded: filter.excluded().clone(),
            copy,
        })
    }

    fn write_target(&self, paths: &DiffPaths, filter: &ExclusionFilter) -> Result<CopyStats> {
        let target = paths.target.as_path();
        let write_err = |source: std::io::Error| DiffError::Write {
            path: target.to_path_buf(),
            source,
        };

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = staging_file(dir).map_err(write_err)?;

        let (writer, stats) = copy_filtered(
            &paths.compare,
            BufWriter::new(staged),
            target,
            filter,
            &self.notifier,
        )?;

        let staged = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
        staged.persist(target).map_err(|e| write_err(e.error))?;

        Ok(stats)
    }
}

/// Temporary output beside the target. On unix it is created with the same
/// umask-filtered mode a plain `File::create` would give, not tempfile's 0600.
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".layerdiff-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
