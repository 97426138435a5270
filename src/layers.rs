//! Layer inventory and shared-layer resolution.
//!
//! A `docker save` export stores every filesystem layer as one directory at the
//! top of the tarball (`<id>/layer.tar`, `<id>/json`, `<id>/VERSION`). The passes
//! here rely on that convention: each genuine layer must be announced by exactly
//! one directory entry, and the directory's path is the layer identifier. An
//! export that never emits directory entries has no detectable layers, so
//! nothing would be stripped from it.

use crate::archive::{open_archive, scan_members, Member};
use crate::error::Result;
use std::collections::btree_set::{self, BTreeSet};
use std::path::Path;

/// Which directory entries count as layer identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerScope {
    /// Every directory entry, wherever it sits.
    #[default]
    AllDirectories,
    /// Only directories directly under the archive root (`"a/"` but not `"a/b/"`).
    TopLevel,
}

impl LayerScope {
    fn admits(self, member: &Member<'_>) -> bool {
        if !member.is_dir() {
            return false;
        }
        match self {
            LayerScope::AllDirectories => true,
            LayerScope::TopLevel => is_top_level(&member.path),
        }
    }
}

fn is_top_level(path: &str) -> bool {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    !trimmed.is_empty() && !trimmed.contains('/')
}

/// Set of layer identifiers, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSet {
    ids: BTreeSet<String>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.ids.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for LayerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a LayerSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Records the layer identifiers present in the tarball at `path`.
///
/// Only headers are inspected; entry content is skipped.
pub fn inventory(path: &Path, scope: LayerScope) -> Result<LayerSet> {
    let mut archive = open_archive(path)?;
    let mut layers = LayerSet::new();

    scan_members(&mut archive, path, |member, _| {
        if scope.admits(&member) {
            layers.insert(member.path);
        }
        Ok(())
    })?;

    log::debug!("{} has {} layers", path.display(), layers.len());
    Ok(layers)
}

/// Returns the identifiers of the tarball at `path` that also appear in `reference`.
///
/// These are the layers the copy pass drops.
pub fn shared_layers(path: &Path, reference: &LayerSet, scope: LayerScope) -> Result<LayerSet> {
    let mut archive = open_archive(path)?;
    let mut shared = LayerSet::new();

    scan_members(&mut archive, path, |member, _| {
        if scope.admits(&member) && reference.contains(&member.path) {
            log::debug!("Layer {} already present in reference", member.path);
            shared.insert(member.path);
        }
        Ok(())
    })?;

    Ok(shared)
}
