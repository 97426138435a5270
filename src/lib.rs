pub mod archive;
pub mod differ;
pub mod error;
pub mod filter;
pub mod inputs;
pub mod layers;
pub mod notifier;

// Re-exports for easy access
pub use differ::{DiffOptions, DiffSummary, ImageDiffer};
pub use error::{DiffError, ErrorKind, ImageRole};
pub use filter::{CopyStats, ExclusionFilter, PrefixMatch};
pub use inputs::DiffPaths;
pub use layers::{LayerScope, LayerSet};
pub use notifier::Notifier;
