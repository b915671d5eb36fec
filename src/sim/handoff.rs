//! Producer/consumer hand-off between a simulation run and its consumer.
//!
//! The producer pushes snapshots into a [`SnapshotSink`] that blocks until
//! the consumer takes them, so a run can never outpace its consumer. A run
//! stops early when the sink reports [`Abandoned`] or its [`CancelToken`]
//! fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use thiserror::Error;
use tracing::debug;

use super::types::Snapshot;

/// Snapshots buffered between producer and consumer.
const HANDOFF_CAPACITY: usize = 1;

/// The consumer stopped accepting snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("snapshot consumer went away")]
pub struct Abandoned;

/// Destination for a run's snapshots.
pub trait SnapshotSink {
    /// Hands one snapshot to the consumer, blocking while it is busy.
    ///
    /// # Errors
    ///
    /// Returns `Abandoned` once the consumer is gone.
    fn accept(&mut self, snapshot: Snapshot) -> Result<(), Abandoned>;
}

impl SnapshotSink for Sender<Snapshot> {
    fn accept(&mut self, snapshot: Snapshot) -> Result<(), Abandoned> {
        self.send(snapshot).map_err(|_| Abandoned)
    }
}

impl SnapshotSink for Vec<Snapshot> {
    fn accept(&mut self, snapshot: Snapshot) -> Result<(), Abandoned> {
        self.push(snapshot);
        Ok(())
    }
}

/// Shared flag asking a running producer to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every tick was delivered.
    Completed { ticks: usize },
    /// The consumer went away after `ticks` deliveries.
    Abandoned { ticks: usize },
    /// The token fired after `ticks` deliveries.
    Cancelled { ticks: usize },
}

impl RunOutcome {
    /// Snapshots delivered before the run ended.
    pub fn ticks(&self) -> usize {
        match *self {
            Self::Completed { ticks } | Self::Abandoned { ticks } | Self::Cancelled { ticks } => ticks,
        }
    }
}

/// Feeds snapshots into `sink` until the source ends, the consumer leaves,
/// or `cancel` fires. No further tick is simulated after either stop signal.
pub fn drive(
    mut snapshots: impl Iterator<Item = Snapshot>,
    sink: &mut impl SnapshotSink,
    cancel: &CancelToken,
) -> RunOutcome {
    let mut ticks = 0;
    loop {
        if cancel.is_cancelled() {
            debug!(ticks, "simulation cancelled");
            return RunOutcome::Cancelled { ticks };
        }
        let Some(snapshot) = snapshots.next() else {
            return RunOutcome::Completed { ticks };
        };
        if sink.accept(snapshot).is_err() {
            debug!(ticks, "snapshot consumer abandoned the run");
            return RunOutcome::Abandoned { ticks };
        }
        ticks += 1;
    }
}

/// A run on a background thread, read as an iterator.
///
/// Dropping the feed cancels the run; the producer exits at its next
/// hand-off without simulating the remaining ticks.
pub struct SnapshotFeed {
    rx: Receiver<Snapshot>,
    cancel: CancelToken,
    handle: Option<JoinHandle<RunOutcome>>,
}

impl SnapshotFeed {
    /// Starts a producer thread for `snapshots`.
    pub fn spawn<I>(snapshots: I) -> Self
    where
        I: Iterator<Item = Snapshot> + Send + 'static,
    {
        let (mut tx, rx) = bounded::<Snapshot>(HANDOFF_CAPACITY);
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || drive(snapshots, &mut tx, &token));
        Self {
            rx,
            cancel,
            handle: Some(handle),
        }
    }

    /// Asks the producer to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stops consuming and waits for the producer to exit.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the producer thread panicked.
    pub fn join(mut self) -> thread::Result<RunOutcome> {
        let handle = self.handle.take();
        drop(self);
        match handle {
            Some(h) => h.join(),
            None => Ok(RunOutcome::Cancelled { ticks: 0 }),
        }
    }
}

impl Iterator for SnapshotFeed {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().ok()
    }
}

impl Drop for SnapshotFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
