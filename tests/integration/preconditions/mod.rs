//! Checks that run before any archive is scanned.

use crate::integration::common::image_fixtures::{dir, write_image};
use anyhow::Result;
use layerdiff::{DiffError, DiffPaths, ErrorKind, ImageRole, Notifier};
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_images_fail_before_output() -> Result<()> {
        let tmp = TempDir::new()?;
        let paths = DiffPaths::new(
            tmp.path().join("base.tar"),
            tmp.path().join("app.tar"),
            tmp.path().join("delta.tar"),
        );

        let err = paths.prepare(&Notifier::silent()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(!paths.target.exists());
        Ok(())
    }

    #[test]
    fn test_missing_comparison_is_reported() -> Result<()> {
        let tmp = TempDir::new()?;
        let reference = tmp.path().join("base.tar");
        write_image(&reference, &[dir("L1/")])?;

        let paths = DiffPaths::new(
            &reference,
            tmp.path().join("app.tar"),
            tmp.path().join("delta.tar"),
        );
        let err = paths.prepare(&Notifier::silent()).unwrap_err();

        assert!(matches!(
            err,
            DiffError::MissingImage {
                role: ImageRole::Comparison,
                ..
            }
        ));
        assert!(err.to_string().starts_with("Unable to find image to compare"));
        Ok(())
    }

    #[test]
    fn test_unremovable_target_fails_before_scanning() -> Result<()> {
        let tmp = TempDir::new()?;
        // Not tarballs at all: scanning them would be a format error.
        let reference = tmp.path().join("base.tar");
        let compare = tmp.path().join("app.tar");
        fs::write(&reference, [0x5au8; 1024])?;
        fs::write(&compare, [0x5au8; 1024])?;

        let target = tmp.path().join("delta.tar");
        fs::create_dir(&target)?;
        fs::write(target.join("keep"), b"x")?;

        let paths = DiffPaths::new(&reference, &compare, &target);
        let err = paths.prepare(&Notifier::silent()).unwrap_err();

        assert!(matches!(err, DiffError::TargetNotRemovable { .. }));
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(target.join("keep").exists());
        Ok(())
    }

    #[test]
    fn test_stale_target_is_removed() -> Result<()> {
        let tmp = TempDir::new()?;
        let reference = tmp.path().join("base.tar");
        let compare = tmp.path().join("app.tar");
        write_image(&reference, &[dir("L1/")])?;
        write_image(&compare, &[dir("L2/")])?;
        let target = tmp.path().join("delta.tar");
        fs::write(&target, b"old")?;

        DiffPaths::new(&reference, &compare, &target).prepare(&Notifier::silent())?;

        assert!(!target.exists());
        Ok(())
    }
}
