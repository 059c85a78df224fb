//! Transfer progress display for the command line
//!
//! Renders one indicatif bar per file transfer on stderr. When stderr is not
//! a terminal, or bars are disabled, nothing is drawn and the transfer is
//! only visible through the log.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::TransferObserver;

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str =
    "{spinner:.green} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})";

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Maximum width for file names in display
    pub max_filename_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            max_filename_width: 40,
        }
    }
}

/// Progress bar for the file currently being downloaded
pub struct ProgressBarObserver {
    config: ProgressConfig,
    is_terminal: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarObserver {
    /// Create an observer drawing on stderr when it is a terminal
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            is_terminal: atty::is(atty::Stream::Stderr),
            bar: Mutex::new(None),
        }
    }

    /// Whether bars are actually drawn
    pub fn is_enabled(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    fn create_bar(&self, file_name: &str, total: Option<u64>) -> ProgressBar {
        let (bar, template) = match total {
            Some(total) if total > 0 => (ProgressBar::new(total), BAR_TEMPLATE),
            _ => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };

        match ProgressStyle::default_bar().template(template) {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => debug!("Progress bar template error: {}", e),
        }
        bar.set_message(truncate_filename(file_name, self.config.max_filename_width));
        bar
    }
}

impl TransferObserver for ProgressBarObserver {
    fn on_start(&self, file_name: &str, total: Option<u64>) {
        if !self.is_enabled() {
            return;
        }
        let bar = self.create_bar(file_name, total);
        if let Ok(mut current) = self.bar.lock() {
            if let Some(previous) = current.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, transferred: u64) {
        if let Ok(current) = self.bar.lock() {
            if let Some(bar) = current.as_ref() {
                bar.set_position(transferred);
            }
        }
    }

    fn on_finish(&self, succeeded: bool) {
        if let Ok(mut current) = self.bar.lock() {
            if let Some(bar) = current.take() {
                if succeeded {
                    bar.finish();
                } else {
                    bar.abandon();
                }
            }
        }
    }
}

/// Shorten a file name to `max_width` characters, keeping its end
fn truncate_filename(name: &str, max_width: usize) -> String {
    let count = name.chars().count();
    if count <= max_width || max_width < 4 {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - (max_width - 3)).collect();
    format!("...{}", tail)
}
