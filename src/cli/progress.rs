//! Progress bars and summary reporting for CLI downloads.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::{
    AlbumReport, AlbumStatus, DownloadProgress, FileStats, SessionStats, format_bytes,
    format_duration,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for a single file download.
fn make_progress_bar(size: u64, name: &str) -> ProgressBar {
    let bar = if size > 0 {
        let bar = ProgressBar::new(size);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("━━╌"),
        );
        bar
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}")
                .expect("spinner template is valid"),
        );
        bar
    };
    bar.set_message(name.to_string());
    bar.enable_steady_tick(Duration::from_millis(250));
    bar
}

/// Renders one bar per in-flight file.
#[derive(Default)]
pub struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarProgress {
    /// Creates an empty set of bars.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&self, name: &str) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn take(&self, name: &str) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Prints a line above the bars.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.multi.println(line.as_ref()).is_err() {
            println!("{}", line.as_ref());
        }
    }
}

impl DownloadProgress for BarProgress {
    fn on_file_start(&self, name: &str, size: u64) {
        let bar = self.multi.add(make_progress_bar(size, name));
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bar);
    }

    fn on_progress(&self, name: &str, bytes_delta: u64) {
        if let Some(bar) = self.bar(name) {
            bar.inc(bytes_delta);
        }
    }

    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        if let Some(bar) = self.take(name) {
            bar.finish_and_clear();
        }
        self.println(format!(
            "  {name} - {} in {} ({}/s avg)",
            format_bytes(stats.size),
            format_duration(stats.elapsed),
            format_bytes(stats.average_speed),
        ));
    }

    fn on_error(&self, name: &str, error: &str) {
        if let Some(bar) = self.take(name) {
            bar.abandon_with_message(format!("{name}: {error}"));
        }
    }
}

/// Prints the outcome of one album.
pub fn print_album_report(progress: &BarProgress, report: &AlbumReport) {
    match &report.status {
        AlbumStatus::AlreadyComplete => progress.println(
            style(format!(
                "Skipping {}, because it is already downloaded.",
                report.name
            ))
            .yellow()
            .to_string(),
        ),
        AlbumStatus::Fetched { resume_point } => {
            let fetched = report.outcomes.iter().filter(|o| !o.is_skipped()).count();
            progress.println(format!(
                "{} {} ({fetched}/{} new)",
                style("Finished").green().bold(),
                report.name,
                report.outcomes.len()
            ));
            if let Some(name) = resume_point {
                progress.println(format!("  Resuming at {name}"));
            }
        }
    }
}

/// Prints a summary of download statistics.
pub fn print_summary(stats: &SessionStats) {
    if stats.files_downloaded == 0 && stats.files_skipped == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    if stats.files_downloaded > 0 {
        println!("  Files downloaded:  {}", stats.files_downloaded);
        println!("  Total size:        {}", format_bytes(stats.total_bytes));
        println!("  Total time:        {}", format_duration(stats.elapsed));
        println!("  Average speed:     {}/s", format_bytes(stats.average_speed()));
        println!("  Peak speed:        {}/s", format_bytes(stats.peak_speed));
    }
    if stats.files_skipped > 0 {
        println!("  Files skipped:     {}", stats.files_skipped);
    }
    println!("{SEPARATOR}");
}
