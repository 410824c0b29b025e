use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::error;

use crate::domain::{DeadLetterQueue, Error};

/// Reports rejected replay rows on stderr and keeps a count of them.
#[derive(Default, Debug)]
pub struct StdErrDLQ {
    reported: AtomicUsize,
}

impl StdErrDLQ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }
}

impl DeadLetterQueue for StdErrDLQ {
    fn report(&self, line: u64, err: &Error) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        error!(line, kind = err.kind(), "row rejected");
        eprintln!("DLQ Report - line {}: {}", line, err);
    }
}
