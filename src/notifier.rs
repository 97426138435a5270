//! Progress reporting for a diff run.
//!
//! [`Notifier`] puts the three passes behind one verbosity switch:
//! - [`VerbosityLevel::Quiet`] → a single `indicatif` spinner naming the current
//!   pass and the number of entries seen so far; only warnings reach the log.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] →
//!   plain `log` records, with a progress line every 100 entries.
//!
//! The global logger itself is installed by the binary; this type never changes
//! what a diff produces, only what the user sees while it runs.

use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::cell::RefCell;
use std::time::Duration;

const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Spinner, warnings only
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    show_spinner: bool,
    spinner: RefCell<Option<ProgressBar>>,
    pass: RefCell<String>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);
        Self {
            verbosity,
            show_spinner: verbosity == VerbosityLevel::Quiet,
            spinner: RefCell::new(None),
            pass: RefCell::new(String::new()),
        }
    }

    /// No spinner and no progress lines. Warnings still go to the log.
    pub fn silent() -> Self {
        Self {
            verbosity: VerbosityLevel::Quiet,
            show_spinner: false,
            spinner: RefCell::new(None),
            pass: RefCell::new(String::new()),
        }
    }

    /// Announces the start of a pass.
    pub fn begin_pass(&self, message: &str) {
        *self.pass.borrow_mut() = message.to_string();

        if !self.show_spinner {
            log::info!("{}", message);
            return;
        }

        let mut slot = self.spinner.borrow_mut();
        let spinner = slot.get_or_insert_with(|| {
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(style);
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });
        spinner.set_message(message.to_string());
    }

    /// Reports that `count` entries of the current pass have been seen.
    pub fn entry_tick(&self, count: u64) {
        if let Some(spinner) = self.spinner.borrow().as_ref() {
            spinner.set_message(format!("{} ({} entries)", self.pass.borrow(), count));
        } else if self.verbosity != VerbosityLevel::Quiet && count % PROGRESS_EVERY == 0 {
            log::info!("{}: {} entries", self.pass.borrow(), count);
        }
    }

    pub fn warn(&self, message: &str) {
        match self.spinner.borrow().as_ref() {
            Some(spinner) => spinner.suspend(|| log::warn!("{}", message)),
            None => log::warn!("{}", message),
        }
    }

    /// Clears the spinner, leaving `message` behind in non-quiet modes.
    pub fn finish(&self, message: &str) {
        match self.spinner.borrow_mut().take() {
            Some(spinner) => spinner.finish_and_clear(),
            None => log::info!("{}", message),
        }
    }
}
