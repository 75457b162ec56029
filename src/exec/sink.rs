//! Renewable output sinks.
//!
//! A [`Sink`] is a shared handle to a channel of output lines. The connection
//! writes into it, the caller reads from it. When a command's stream ends the
//! multiplexer closes the current channel and installs a fresh one, so the
//! same `Sink` can be registered once and reused by every later command:
//!
//! ```ignore
//! let sink = Sink::new();
//! connection.set_stdout_sink(Some(sink.clone()));
//!
//! let mut lines = sink.receiver().expect("fresh generation");
//! connection.run("get-service -name kubelet", None).await?;
//! while let Some(line) = lines.recv().await { /* ... */ }
//!
//! // next command: take the receiver of the new generation
//! let mut lines = sink.receiver().expect("fresh generation");
//! ```
//!
//! Channels are unbounded, so a caller that only starts reading after `run`
//! returns never stalls the producing process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, mpsc};

/// Receiving end of one sink generation.
pub type SinkReceiver = mpsc::UnboundedReceiver<String>;

/// Shared, renewable destination for output lines.
#[derive(Clone, Default)]
pub struct Sink {
    inner: Arc<SinkInner>,
}

#[derive(Default)]
struct SinkInner {
    /// Held by a multiplexer for the whole drain of one stream.
    drain: AsyncMutex<()>,
    state: Mutex<Generation>,
}

struct Generation {
    sender: Option<mpsc::UnboundedSender<String>>,
    receiver: Option<SinkReceiver>,
    closes: u64,
}

impl Default for Generation {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
            closes: 0,
        }
    }
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the receiver of the current generation.
    ///
    /// Returns `None` if it was already taken; call again after the next
    /// command finishes to get the following generation.
    pub fn receiver(&self) -> Option<SinkReceiver> {
        self.state().receiver.take()
    }

    /// Push one line into the current generation.
    ///
    /// Returns `false` when the generation is closed or its receiver dropped.
    pub fn send(&self, line: String) -> bool {
        match &self.state().sender {
            Some(sender) => sender.send(line).is_ok(),
            None => false,
        }
    }

    /// Close the current generation. Readers see the buffered lines, then `None`.
    pub fn close(&self) {
        let mut state = self.state();
        if state.sender.take().is_some() {
            state.closes += 1;
        }
    }

    /// Close the current generation and install a fresh, open one.
    ///
    /// Both happen under one lock: a reader that sees the old generation end
    /// always finds the next receiver waiting. An unread receiver of the
    /// previous generation that was never taken is discarded along with its
    /// lines.
    pub fn renew(&self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state();
        let previous = state.sender.replace(sender);
        state.receiver = Some(receiver);
        if previous.is_some() {
            state.closes += 1;
        }
        drop(previous);
    }

    /// Whether the current generation still accepts lines.
    pub fn is_open(&self) -> bool {
        self.state().sender.is_some()
    }

    /// Number of generations closed so far.
    pub fn closed_generations(&self) -> u64 {
        self.state().closes
    }

    /// Whether both handles refer to the same sink.
    pub fn same_as(&self, other: &Sink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) async fn lock_drain(&self) -> AsyncMutexGuard<'_, ()> {
        self.inner.drain.lock().await
    }

    fn state(&self) -> MutexGuard<'_, Generation> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persistently registered stdout/stderr sinks of one connection.
#[derive(Default)]
pub(crate) struct SinkSlots {
    stdout: Mutex<Option<Sink>>,
    stderr: Mutex<Option<Sink>>,
}

impl SinkSlots {
    pub(crate) fn set_stdout(&self, sink: Option<Sink>) {
        *self.stdout.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub(crate) fn set_stderr(&self, sink: Option<Sink>) {
        *self.stderr.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Sinks for one command: an explicit stdout sink wins over the registered one.
    pub(crate) fn resolve(&self, explicit: Option<&Sink>) -> (Option<Sink>, Option<Sink>) {
        let stdout = match explicit {
            Some(sink) => Some(sink.clone()),
            None => self
                .stdout
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };
        (stdout, self.stderr())
    }

    pub(crate) fn stderr(&self) -> Option<Sink> {
        self.stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
