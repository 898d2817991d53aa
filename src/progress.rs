//! Progress
//!
//! Cooperative cancellation and progress reporting. The learners poll [`ProgressMonitor::check_canceled`]
//! before every tree and at the top of every node so that a cancel request unwinds the build quickly.
use crate::errors::TreeEnsembleError;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub trait ProgressMonitor: Send + Sync {
    /// Returns `Err(TreeEnsembleError::Canceled)` once cancellation was requested.
    fn check_canceled(&self) -> Result<(), TreeEnsembleError>;
    /// Report progress as a fraction between 0 and 1.
    fn set_progress(&self, fraction: f64, message: &str);
    /// Monitor for a sub task covering the next `weight` of this monitor, starting at the progress reported so far.
    fn create_sub_progress(&self, weight: f64) -> Box<dyn ProgressMonitor + '_>;
}

/// Never cancels, ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl ProgressMonitor for NoopMonitor {
    fn check_canceled(&self) -> Result<(), TreeEnsembleError> {
        Ok(())
    }

    fn set_progress(&self, _fraction: f64, _message: &str) {}

    fn create_sub_progress(&self, _weight: f64) -> Box<dyn ProgressMonitor + '_> {
        Box::new(NoopMonitor)
    }
}

/// Monitor backed by a shared flag, cloned handles cancel each other.
#[derive(Debug, Default, Clone)]
pub struct CancelableMonitor {
    canceled: Arc<AtomicBool>,
    progress: Arc<AtomicU64>,
}

impl CancelableMonitor {
    pub fn new() -> Self {
        CancelableMonitor::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Last reported progress.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::SeqCst))
    }
}

impl ProgressMonitor for CancelableMonitor {
    fn check_canceled(&self) -> Result<(), TreeEnsembleError> {
        if self.is_canceled() {
            Err(TreeEnsembleError::Canceled)
        } else {
            Ok(())
        }
    }

    fn set_progress(&self, fraction: f64, message: &str) {
        self.progress.store(fraction.to_bits(), Ordering::SeqCst);
        debug!("progress {:.3}: {}", fraction, message);
    }

    fn create_sub_progress(&self, weight: f64) -> Box<dyn ProgressMonitor + '_> {
        Box::new(SubProgress::new(self, self.progress(), weight))
    }
}

/// Maps progress `[0, 1]` of a sub task onto `[offset, offset + weight]` of its parent.
pub struct SubProgress<'a> {
    parent: &'a dyn ProgressMonitor,
    offset: f64,
    weight: f64,
    reported: AtomicU64,
}

impl<'a> SubProgress<'a> {
    pub fn new(parent: &'a dyn ProgressMonitor, offset: f64, weight: f64) -> Self {
        SubProgress {
            parent,
            offset,
            weight,
            reported: AtomicU64::new(0.0_f64.to_bits()),
        }
    }
}

impl ProgressMonitor for SubProgress<'_> {
    fn check_canceled(&self) -> Result<(), TreeEnsembleError> {
        self.parent.check_canceled()
    }

    fn set_progress(&self, fraction: f64, message: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.reported.store(fraction.to_bits(), Ordering::SeqCst);
        self.parent.set_progress(self.offset + self.weight * fraction, message);
    }

    fn create_sub_progress(&self, weight: f64) -> Box<dyn ProgressMonitor + '_> {
        let offset = f64::from_bits(self.reported.load(Ordering::SeqCst));
        Box::new(SubProgress::new(self, offset, weight))
    }
}
