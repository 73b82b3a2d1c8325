use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::ReachabilityConfig,
    net::TransitionIndex,
    reachability::result::{AbortReason, SearchStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReachabilityStatus {
    Started,
    Progress,
    Success,
    Failure,
    Finished,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityEvent {
    pub status: ReachabilityStatus,
    /// Number of expanded nodes so far.
    pub steps: u64,
    /// The found path, only set for [`ReachabilityStatus::Success`].
    pub path: Option<Vec<TransitionIndex>>,
}

/// Receives the events of a search. Implemented for closures and for channel
/// senders.
pub trait ReachabilityListener: Send {
    fn on_event(&mut self, event: &ReachabilityEvent);
}

impl<F: FnMut(&ReachabilityEvent) + Send> ReachabilityListener for F {
    fn on_event(&mut self, event: &ReachabilityEvent) {
        self(event)
    }
}

impl ReachabilityListener for mpsc::Sender<ReachabilityEvent> {
    fn on_event(&mut self, event: &ReachabilityEvent) {
        // a dropped receiver just means nobody listens anymore
        let _ = self.send(event.clone());
    }
}

/// Shared flag to stop a running search. The search looks at it once per
/// expansion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a search needs from the outside world: listeners, a
/// cancellation token and resource limits.
pub struct Reporter {
    listeners: Vec<Box<dyn ReachabilityListener>>,
    cancellation: CancellationToken,
    progress_interval: u64,
    timeout: Option<Duration>,
    max_iterations: Option<u64>,
    start: Instant,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter {
            listeners: vec![],
            cancellation: CancellationToken::new(),
            progress_interval: 100,
            timeout: None,
            max_iterations: None,
            start: Instant::now(),
        }
    }

    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Reporter {
            progress_interval: (*config.get_progress_interval()).max(1),
            timeout: *config.get_timeout(),
            max_iterations: *config.get_max_iterations(),
            ..Self::new()
        }
    }

    pub fn with_listener(mut self, listener: impl ReachabilityListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&mut self, listener: impl ReachabilityListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn emit(&mut self, status: ReachabilityStatus, steps: u64, path: Option<Vec<TransitionIndex>>) {
        let event = ReachabilityEvent {
            status,
            steps,
            path,
        };
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn started(&mut self) {
        self.start = Instant::now();
        self.emit(ReachabilityStatus::Started, 0, None);
    }

    /// Called once per expansion with the number of expansions so far.
    /// Emits progress and reports why the search has to stop, if it has to.
    pub fn expanded(&mut self, steps: u64) -> Result<(), AbortReason> {
        if self.cancellation.is_cancelled() {
            return Err(AbortReason::Cancelled);
        }

        if self.max_iterations.map(|max| steps > max).unwrap_or(false) {
            return Err(AbortReason::MaxIterationsReached);
        }

        if self
            .timeout
            .map(|timeout| self.start.elapsed() > timeout)
            .unwrap_or(false)
        {
            return Err(AbortReason::Timeout);
        }

        if steps > 0 && steps % self.progress_interval == 0 {
            self.emit(ReachabilityStatus::Progress, steps, None);
        }

        Ok(())
    }

    /// Emits the terminal event of a search.
    pub fn finished(&mut self, status: &SearchStatus, steps: u64) {
        let path = match status {
            SearchStatus::Success(path) => Some(path.clone()),
            _ => None,
        };
        self.emit(status.to_event_status(), steps, path);
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
