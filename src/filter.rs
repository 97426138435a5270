//! The filtered copy pass: stream the comparison tarball into the output, minus
//! every member that lives under a shared layer.
//!
//! Retained members are written with their original header blocks and any
//! long-name/pax records that precede them, so the output uses the same framing
//! as the input. Order is preserved.

use crate::archive::{open_archive, scan_members, Member};
use crate::error::{DiffError, Result};
use crate::layers::LayerSet;
use crate::notifier::Notifier;
use std::io::Write;
use std::path::Path;
use tar_rs::Builder;

/// How an entry path is tested against an excluded layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixMatch {
    /// Plain `starts_with` on the full path. `"abc/"` only drops what begins with
    /// `"abc/"`, but an identifier without a trailing slash such as `"abc"` also
    /// drops `"abcdef/file"`.
    #[default]
    Literal,
    /// Matches the identifier itself and paths below it, at a `/` boundary.
    Segment,
}

impl PrefixMatch {
    pub fn matches(self, path: &str, id: &str) -> bool {
        match self {
            PrefixMatch::Literal => path.starts_with(id),
            PrefixMatch::Segment => {
                let dir = id.strip_suffix('/').unwrap_or(id);
                path == dir
                    || path
                        .strip_prefix(dir)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Exclusion set plus the policy used to apply it.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    excluded: LayerSet,
    policy: PrefixMatch,
}

impl ExclusionFilter {
    pub fn new(excluded: LayerSet, policy: PrefixMatch) -> Self {
        Self { excluded, policy }
    }

    pub fn excluded(&self) -> &LayerSet {
        &self.excluded
    }

    pub fn excludes(&self, path: &str) -> bool {
        self.excluded.iter().any(|id| self.policy.matches(path, id))
    }

    fn retains(&self, member: &Member<'_>) -> bool {
        member.is_global() || !self.excludes(&member.path)
    }
}

/// Counters reported by [`copy_filtered`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub entries_read: u64,
    pub entries_written: u64,
    pub entries_skipped: u64,
    /// Stored content bytes of retained entries, headers and padding excluded.
    pub bytes_copied: u64,
}

/// Copies the tarball at `source` into `output`, dropping members the filter excludes.
///
/// `target` only labels write errors. The writer is flushed after every retained
/// member; on success the archive trailer has been written and the writer is
/// handed back for the caller to finalize.
pub fn copy_filtered<W: Write>(
    source: &Path,
    output: W,
    target: &Path,
    filter: &ExclusionFilter,
    notifier: &Notifier,
) -> Result<(W, CopyStats)> {
    let write_err = |source: std::io::Error| DiffError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut archive = open_archive(source)?;
    let mut builder = Builder::new(output);
    let mut stats = CopyStats::default();

    scan_members(&mut archive, source, |member, data| {
        stats.entries_read += 1;
        notifier.entry_tick(stats.entries_read);

        if !filter.retains(&member) {
            log::trace!("Skipping {}", member.path);
            stats.entries_skipped += 1;
            return Ok(());
        }

        for ext in member.extensions {
            builder
                .append(&ext.header, ext.data.as_slice())
                .map_err(write_err)?;
        }

        builder.append(member.header, data).map_err(write_err)?;
        builder.get_mut().flush().map_err(write_err)?;

        stats.entries_written += 1;
        stats.bytes_copied += member.size;
        Ok(())
    })?;

    let mut output = builder.into_inner().map_err(write_err)?;
    output.flush().map_err(write_err)?;

    Ok((output, stats))
}
