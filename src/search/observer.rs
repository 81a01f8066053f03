//! Observer seam between a running search and whoever is watching it.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::scanner::ScanStats;
use crate::types::FileRecord;

/// Hooks invoked as a search moves through its folders.
///
/// Every method has a no-op default, so implementations pick the events
/// they care about. All calls arrive on the thread running the search, in
/// order.
pub trait SearchObserver {
    /// Human-readable status line, e.g. `Searching folder 1/3: data...`.
    fn status(&mut self, _message: &str) {}

    /// A folder is about to be processed. `index` is zero-based.
    fn folder_started(&mut self, _index: usize, _total: usize, _folder: &str) {}

    /// Walk counters for the folder currently being scanned. Fires once per
    /// directory entered; never fires for cache-served folders.
    fn scan_progress(&mut self, _directory: &Path, _stats: &ScanStats) {}

    /// A folder finished, with the records it contributed.
    fn folder_finished(&mut self, _index: usize, _records: &[FileRecord]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SearchObserver for NullObserver {}

/// Adapts a closure over status lines into an observer.
pub struct StatusLines<F: FnMut(&str)>(pub F);

impl<F: FnMut(&str)> SearchObserver for StatusLines<F> {
    fn status(&mut self, message: &str) {
        (self.0)(message)
    }
}

/// Rate limiter for chatty status lines.
pub(crate) struct Throttle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    /// True when enough time has passed since the last accepted emit. A
    /// true return counts as an emit.
    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_adapter_forwards_messages() {
        let mut seen: Vec<String> = Vec::new();
        {
            let mut observer = StatusLines(|line: &str| seen.push(line.to_string()));
            observer.status("first");
            observer.folder_started(0, 1, "/data");
            observer.status("second");
        }
        assert_eq!(seen, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn throttle_accepts_then_suppresses_then_recovers() {
        let mut throttle = Throttle::new(Duration::from_millis(20));
        assert!(throttle.ready());
        assert!(!throttle.ready());
        std::thread::sleep(Duration::from_millis(25));
        assert!(throttle.ready());
    }
}
