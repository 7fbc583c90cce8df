use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives one tick per finished unit of work.
pub trait ProgressSink: Send + Sync {
    fn start(&self, _total: usize) {}

    fn tick(&self, label: Option<&str>);

    fn finish(&self) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&self, _label: Option<&str>) {}
}

/// Logs `done/total` at info level.
#[derive(Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl LogProgress {
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn tick(&self, label: Option<&str>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        match label {
            Some(label) => log::info!("[{done}/{total}] {label}"),
            None => log::info!("[{done}/{total}]"),
        }
    }

    fn finish(&self) {
        log::info!("{} of {} ROIs processed", self.done(), self.total.load(Ordering::Relaxed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progress_counts_ticks() {
        let progress = LogProgress::default();
        progress.start(3);
        progress.tick(Some("a"));
        progress.tick(None);
        assert_eq!(progress.done(), 2);
        progress.start(1);
        assert_eq!(progress.done(), 0);
    }
}
