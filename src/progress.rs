//! # Progress Tracking and Statistics Module
//!
//! Byte-savings bookkeeping for one image stage run, and the spinner shown
//! by the build tasks while files are being processed.
//!
//! ## Components:
//! - `RunTotals`: original/saved byte sums, only counting files whose
//!   compression strictly reduced size
//! - `RunSummary`: what the stage reports once its input is exhausted
//! - `ProgressManager`: `indicatif` spinner with a per-file message
//!
//! ## Example:
//! ```rust
//! # use build_assets::RunTotals;
//! let mut totals = RunTotals::default();
//! totals.record(1000, 600);
//! assert_eq!(totals.summary().saved_percent, 40.0);
//! ```

use crate::utils::{format_percent, pretty_bytes};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Running byte sums for one stage instance
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTotals {
    pub original_bytes: u64,
    pub saved_bytes: u64,
    pub minified_files: usize,
}

impl RunTotals {
    /// Records one compressed file. Sizes only count toward the totals
    /// when the optimized output is strictly smaller.
    pub fn record(&mut self, original_size: u64, optimized_size: u64) {
        self.minified_files += 1;
        if optimized_size < original_size {
            self.original_bytes += original_size;
            self.saved_bytes += original_size - optimized_size;
        }
    }

    pub fn saved_percent(&self) -> f64 {
        if self.original_bytes > 0 {
            (self.saved_bytes as f64 / self.original_bytes as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            original_bytes: self.original_bytes,
            saved_bytes: self.saved_bytes,
            minified_files: self.minified_files,
            saved_percent: self.saved_percent(),
        }
    }
}

/// Run metadata produced when a stage is finalized
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub original_bytes: u64,
    pub saved_bytes: u64,
    pub minified_files: usize,
    pub saved_percent: f64,
}

impl RunSummary {
    pub fn format_summary(&self) -> String {
        let noun = if self.minified_files == 1 { "image" } else { "images" };
        let mut msg = format!("Minified {} {}", self.minified_files, noun);
        if self.minified_files > 0 {
            msg.push_str(&format!(
                " (saved {} - {}%)",
                pretty_bytes(self.saved_bytes as i64),
                format_percent(self.saved_percent)
            ));
        }
        msg
    }
}

/// Spinner shown while a task walks its files. Hidden when stderr is not a terminal.
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn spinner(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one file and show its name
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
