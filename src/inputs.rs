use crate::error::{DiffError, ImageRole, Result};
use crate::notifier::Notifier;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The three paths a diff run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPaths {
    pub reference: PathBuf,
    pub compare: PathBuf,
    pub target: PathBuf,
}

impl DiffPaths {
    pub fn new(
        reference: impl Into<PathBuf>,
        compare: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference: reference.into(),
            compare: compare.into(),
            target: target.into(),
        }
    }

    /// Checks that both images exist, then removes a pre-existing target.
    ///
    /// Runs before any archive is opened, so a failure here leaves the
    /// filesystem untouched apart from the target removal itself.
    pub fn prepare(&self, notifier: &Notifier) -> Result<()> {
        check_image(&self.reference, ImageRole::Reference, notifier)?;
        check_image(&self.compare, ImageRole::Comparison, notifier)?;
        clear_target(&self.target)
    }
}

fn check_image(path: &Path, role: ImageRole, notifier: &Notifier) -> Result<()> {
    if !path.exists() {
        return Err(DiffError::MissingImage {
            role,
            path: path.to_path_buf(),
        });
    }

    if !path.is_file() {
        return Err(DiffError::NotAFile {
            role,
            path: path.to_path_buf(),
        });
    }

    // Basic name check only; the content decides.
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    if extension != "tar" && extension != "gz" {
        notifier.warn(&format!(
            "{} does not have a .tar extension. Proceeding anyway, but this might not be a valid image tarball.",
            path.display()
        ));
    }

    Ok(())
}

/// Removes whatever file or symlink sits at `target`. Directories are refused.
pub fn clear_target(target: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(DiffError::TargetNotRemovable {
                path: target.to_path_buf(),
                source,
            })
        }
    };

    if metadata.is_dir() {
        return Err(DiffError::TargetNotRemovable {
            path: target.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "target is a directory"),
        });
    }

    log::debug!("Removing existing target: {}", target.display());
    fs::remove_file(target).map_err(|source| DiffError::TargetNotRemovable {
        path: target.to_path_buf(),
        source,
    })
}
