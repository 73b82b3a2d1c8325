use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

use anyhow::anyhow;

use crate::{
    marking::MarkingLike,
    reachability::{
        algorithms::ReachabilityAlgorithm,
        event::{CancellationToken, ReachabilityEvent, Reporter},
        result::SearchResult,
    },
};

/// A search running on its own thread.
pub struct SearchHandle<M: MarkingLike> {
    cancellation: CancellationToken,
    thread: JoinHandle<SearchResult<M>>,
}

impl<M: MarkingLike> SearchHandle<M> {
    /// Asks the search to stop. It ends with an aborted status at its next
    /// expansion.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the search to end.
    pub fn join(self) -> anyhow::Result<SearchResult<M>> {
        self.thread
            .join()
            .map_err(|_| anyhow!("Search thread panicked"))
    }
}

/// Runs `algorithm` on a new thread.
pub fn spawn<A>(mut algorithm: A, mut reporter: Reporter) -> SearchHandle<A::Marking>
where
    A: ReachabilityAlgorithm + Send + 'static,
{
    let cancellation = reporter.cancellation_token();
    let thread = thread::spawn(move || algorithm.run(&mut reporter));

    SearchHandle {
        cancellation,
        thread,
    }
}

/// Like [`spawn`], additionally forwarding all events of the search to the
/// returned receiver.
pub fn spawn_with_events<A>(
    algorithm: A,
    reporter: Reporter,
) -> (SearchHandle<A::Marking>, mpsc::Receiver<ReachabilityEvent>)
where
    A: ReachabilityAlgorithm + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    (spawn(algorithm, reporter.with_listener(sender)), receiver)
}
