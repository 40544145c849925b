use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress increments from a running scan. Owned by a single consumer thread.
pub trait ProgressReporter: Send {
    fn advance(&self, n: u64);
    fn finish(&self) {}
}

/// Creates a reporter once the size of a run is known.
pub trait ProgressFactory: Sync {
    fn start(&self, total: u64, description: &str) -> Box<dyn ProgressReporter>;
}

/// Renders a progress bar on stderr. Hidden automatically when stderr is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalProgress;

impl ProgressFactory for TerminalProgress {
    fn start(&self, total: u64, description: &str) -> Box<dyn ProgressReporter> {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(description.to_string());
        Box::new(bar)
    }
}

impl ProgressReporter for ProgressBar {
    fn advance(&self, n: u64) {
        self.inc(n);
    }

    fn finish(&self) {
        self.finish_and_clear();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressFactory for NoProgress {
    fn start(&self, _total: u64, _description: &str) -> Box<dyn ProgressReporter> {
        Box::new(NoProgress)
    }
}

impl ProgressReporter for NoProgress {
    fn advance(&self, _n: u64) {}
}
