use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

const WORKER_NAMES: [&str; 5] = ["Rocket", "Lightning", "Unicorn", "Dragon", "Shark"];

const NAME_WIDTH: usize = 18;

/// Display label for a worker, padded so bars line up
pub fn worker_display_name(worker_id: usize) -> String {
    let name = match WORKER_NAMES.get(worker_id) {
        Some(name) => format!("{} Worker", name),
        None => format!("Worker {}", worker_id),
    };
    format!("{:<width$}", name, width = NAME_WIDTH)
}

/// Per-worker progress indicator
pub trait ProgressReporter: Send {
    fn advance(&self, n: u64);

    fn close(&self);
}

/// Hands out one reporter per worker.
///
/// `slot` is the worker id; reporters with distinct slots must be able to
/// render concurrently without interleaving.
pub trait ProgressSink: Sync {
    fn reporter(&self, total: u64, label: &str, slot: usize) -> Box<dyn ProgressReporter>;
}

/// Draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn advance(&self, _n: u64) {}

    fn close(&self) {}
}

impl ProgressSink for NoProgress {
    fn reporter(&self, _total: u64, _label: &str, _slot: usize) -> Box<dyn ProgressReporter> {
        Box::new(NoopReporter)
    }
}

/// One bar per worker on stderr, stacked by slot
pub struct TerminalProgress {
    multi: Option<MultiProgress>,
    unit: String,
}

impl TerminalProgress {
    /// Bars are hidden when stderr is not a terminal
    pub fn new(unit: impl Into<String>) -> Self {
        let multi = if std::io::stderr().is_terminal() {
            Some(MultiProgress::new())
        } else {
            None
        };
        Self {
            multi,
            unit: unit.into(),
        }
    }

    fn style(&self) -> ProgressStyle {
        let template = format!(
            "{{prefix}} {{percent:>3}}%|{{bar:40.green}}| {{pos}}/{{len}} {} [{{elapsed_precise}}<{{eta_precise}}, {{per_sec}}]",
            self.unit
        );
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ ")
    }
}

struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn close(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn reporter(&self, total: u64, label: &str, slot: usize) -> Box<dyn ProgressReporter> {
        let Some(multi) = &self.multi else {
            return Box::new(NoopReporter);
        };

        let bar = multi.insert(slot, ProgressBar::new(total));
        bar.set_style(self.style());
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(200));
        Box::new(BarReporter { bar })
    }
}
