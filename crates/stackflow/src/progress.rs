use indicatif::{ProgressBar, ProgressStyle};
use stackflow_cloud::{ActionType, ApplyObserver, FailureCause};
use stackflow_core::ResourceInstance;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Spinner that follows scheduler transitions
pub struct ApplyProgress {
    progress_bar: ProgressBar,
    total: usize,
    settled: AtomicUsize,
}

impl ApplyProgress {
    pub fn new(total: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Provisioning {} resources...", total));

        Self {
            progress_bar: pb,
            total,
            settled: AtomicUsize::new(0),
        }
    }

    fn settle(&self) -> usize {
        self.settled.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_with_message("Apply completed ✓");
    }

    pub fn finish_error(&self, failed: usize) {
        self.progress_bar
            .finish_with_message(format!("Apply finished with {} failed resources", failed));
    }
}

impl ApplyObserver for ApplyProgress {
    fn on_dispatch(&self, id: &str, action: ActionType) {
        self.progress_bar.set_message(format!("{} {}", action, id));
    }

    fn on_ready(&self, instance: &ResourceInstance) {
        let n = self.settle();
        self.progress_bar
            .set_message(format!("[{}/{}] ready: {}", n, self.total, instance.id));
    }

    fn on_failed(&self, id: &str, cause: &FailureCause) {
        let n = self.settle();
        self.progress_bar
            .set_message(format!("[{}/{}] failed: {} ({})", n, self.total, id, cause));
    }
}
