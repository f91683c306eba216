//! Progress reporting seam between the engine and its frontends.
use indicatif::ProgressBar;

/// Receives byte-level progress for a single part.
///
/// Workers call these from async context; implementations must not block.
pub trait ProgressObserver: Send + Sync {
    /// Reports `n` more bytes written to disk.
    fn inc(&self, n: u64);
    /// Shows a short status message for this part.
    fn message(&self, msg: String);
    /// Marks the part as finished.
    fn finish(&self);
}

/// Terminal progress bar backed by `indicatif`.
pub struct ConsoleObserver {
    pub pb: ProgressBar,
}

impl ProgressObserver for ConsoleObserver {
    fn inc(&self, n: u64) {
        self.pb.inc(n);
    }

    fn message(&self, msg: String) {
        self.pb.set_message(msg);
    }

    fn finish(&self) {
        self.pb.finish();
    }
}

/// Silent observer for tests and embedders that render progress elsewhere.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn inc(&self, _n: u64) {}

    fn message(&self, _msg: String) {}

    fn finish(&self) {}
}
