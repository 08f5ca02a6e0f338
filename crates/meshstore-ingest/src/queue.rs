//! Bounded work queue (C4): a fixed-capacity blocking FIFO between the
//! producer threads and the single consumer thread.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Convention default: 1024 slots.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub enum WorkItem {
    Cell { t: u64, mesh: u32, value: i32 },
    /// Enqueued once by the coordinator after every producer has joined;
    /// signals the consumer to stop.
    Shutdown,
}

pub fn bounded_queue(capacity: usize) -> (Sender<WorkItem>, Receiver<WorkItem>) {
    channel::bounded(capacity)
}

/// Non-blocking variant exposed alongside the blocking `recv`, not required
/// by the pipeline itself but part of the component's contract.
pub fn dequeue_with_timeout(rx: &Receiver<WorkItem>, timeout: Duration) -> Option<WorkItem> {
    match rx.recv_timeout(timeout) {
        Ok(item) => Some(item),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(WorkItem::Shutdown),
    }
}
