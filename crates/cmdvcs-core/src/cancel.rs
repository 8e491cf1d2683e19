use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal polled by long-running operations
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Flag flipped by a Ctrl+C handler or another thread
impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl Cancellation for Arc<AtomicBool> {
    fn is_cancelled(&self) -> bool {
        self.as_ref().is_cancelled()
    }
}

/// Any `Fn() -> bool`, e.g. a host's progress indicator check
impl<F> Cancellation for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct NotCancelled;

impl Cancellation for NotCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}
