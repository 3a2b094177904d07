//! Event system for session notifications.
//!
//! Every component of a session (state machine, stream reader, keep-alive)
//! reports through one [`EventDispatcher`]. Consumers either poll a
//! [`Subscription`] or hand a [`ConnectionListener`] to
//! [`EventDispatcher::forward_to`].

mod listener;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::types::DataFrame;

pub use listener::{ConnectionListener, LoggingListener};

/// Returns the current time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A matched device is being connected to.
    ConnectionAttemptInProgress,
    /// Channel to the device is open.
    ConnectionEstablished,
    /// The stream reader has started.
    DataReadAttemptInProgress,
    /// A frame was read, or `None` if the read was aborted mid-frame.
    DataFrameArrived(Option<DataFrame>),
    /// The stream reader has exited.
    DataReadStopped,
    /// The link is gone and needs a reset and reconnect.
    BrokenConnection,
    /// Reset finished; the session is idle.
    ConnectionReset,
    /// Diagnostic message.
    Log { timestamp_ms: u64, message: String },
}

impl Event {
    /// Creates a log event stamped with the current time.
    #[must_use]
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            timestamp_ms: now_ms(),
            message: message.into(),
        }
    }

    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionAttemptInProgress => EventKind::ConnectionAttemptInProgress,
            Self::ConnectionEstablished => EventKind::ConnectionEstablished,
            Self::DataReadAttemptInProgress => EventKind::DataReadAttemptInProgress,
            Self::DataFrameArrived(_) => EventKind::DataFrameArrived,
            Self::DataReadStopped => EventKind::DataReadStopped,
            Self::BrokenConnection => EventKind::BrokenConnection,
            Self::ConnectionReset => EventKind::ConnectionReset,
            Self::Log { .. } => EventKind::Log,
        }
    }
}

/// Discriminant of [`Event`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionAttemptInProgress,
    ConnectionEstablished,
    DataReadAttemptInProgress,
    DataFrameArrived,
    DataReadStopped,
    BrokenConnection,
    ConnectionReset,
    Log,
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Subscription filter for specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted kinds; `None` accepts everything.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    /// Creates a filter for a single event kind.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self::kinds(vec![kind])
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Logs a diagnostic through `tracing` and dispatches it as [`Event::Log`].
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.dispatch(Event::log(message));
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                loop {
                    let event = subscription.recv().await?;
                    if filter.matches(&event) {
                        return Some(event);
                    }
                }
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }

    /// Spawns a task that feeds every event to `listener`.
    ///
    /// The task ends when the dispatcher is dropped; abort the handle to
    /// detach the listener earlier.
    pub fn forward_to<L>(&self, listener: L) -> JoinHandle<()>
    where
        L: ConnectionListener + 'static,
    {
        let mut subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                listener.on_event(event);
            }
        })
    }
}
