use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use layerdiff::notifier::VerbosityLevel;
use layerdiff::{DiffOptions, DiffPaths, ImageDiffer, LayerScope, Notifier, PrefixMatch};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Reference image tarball whose layers are already available (e.g., base.tar)")]
    reference: PathBuf,

    #[arg(help = "Image tarball to diff against the reference (e.g., app.tar)")]
    compare: PathBuf,

    #[arg(help = "Output tarball; replaced if it already exists")]
    target: PathBuf,

    #[arg(
        long,
        help = "Exclude only whole path segments under a shared layer instead of any path sharing its prefix"
    )]
    segment_match: bool,

    #[arg(long, help = "Only treat top-level directories as layers")]
    top_level_only: bool,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> DiffOptions {
        DiffOptions {
            prefix_match: if self.segment_match {
                PrefixMatch::Segment
            } else {
                PrefixMatch::Literal
            },
            layer_scope: if self.top_level_only {
                LayerScope::TopLevel
            } else {
                LayerScope::AllDirectories
            },
        }
    }
}

fn main() -> Result<()> {
    // Bare invocation is a usage request, not an error.
    if std::env::args_os().len() <= 1 {
        Cli::command().print_help()?;
        return Ok(());
    }

    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(VerbosityLevel::from(cli.verbose).to_log_level())
        .init();

    let options = cli.options();
    let paths = DiffPaths::new(&cli.reference, &cli.compare, &cli.target);

    debug!("Reference image: {}", paths.reference.display());
    debug!("Image to compare: {}", paths.compare.display());
    debug!("Target image: {}", paths.target.display());
    debug!("Options: {:?}", options);

    let notifier = Notifier::new(cli.verbose);
    paths.prepare(&notifier)?;

    let differ = ImageDiffer::new(options, notifier);
    let summary = differ.diff(&paths).with_context(|| {
        format!(
            "Failed to diff {} against {}",
            paths.compare.display(),
            paths.reference.display()
        )
    })?;

    info!(
        "Dropped {} shared layers; wrote {} entries ({} bytes) to {}",
        summary.excluded.len(),
        summary.copy.entries_written,
        summary.copy.bytes_copied,
        paths.target.display()
    );

    Ok(())
}
