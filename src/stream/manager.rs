//! Live agent-run streams.
//!
//! [`StreamManager`] keeps at most one open stream per run id. Opening a
//! stream for a run that already has one shuts the old stream down, and the
//! new connection is only made after the old one has fully closed. Runs that
//! are known to be finished are answered immediately without touching the
//! network.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::runtime::Handle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    FlowdeckError, StreamConfig,
    common::Shutdown,
    model::RunId,
    stream::{ActiveStream, Frame, RunRegistry, RunTransport, classify},
};

type MessageFn = Box<dyn FnMut(String) + Send + Sync>;
type ErrorFn = Box<dyn FnMut(FlowdeckError) + Send + Sync>;
type CloseFn = Box<dyn FnOnce() + Send + Sync>;

/// Receivers for one stream. Every callback is optional.
pub struct StreamCallbacks {
    on_message: MessageFn,
    on_error: ErrorFn,
    on_close: Option<CloseFn>,
}

impl Default for StreamCallbacks {
    fn default() -> Self {
        Self {
            on_message: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            on_close: None,
        }
    }
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw frame payloads, uninterpreted.
    pub fn on_message(
        mut self,
        f: impl FnMut(String) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Box::new(f);
        self
    }

    pub fn on_error(
        mut self,
        f: impl FnMut(FlowdeckError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Box::new(f);
        self
    }

    /// Called exactly once, whatever ends the stream.
    pub fn on_close(
        mut self,
        f: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    fn message(
        &mut self,
        raw: String,
    ) {
        (self.on_message)(raw);
    }

    fn error(
        &mut self,
        err: FlowdeckError,
    ) {
        (self.on_error)(err);
    }

    fn close(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

/// Cancels the stream it was returned for.
pub struct StreamHandle {
    run_id: RunId,
    generation: u64,
    shutdown: Option<Arc<Shutdown>>,
    registry: Arc<RunRegistry>,
}

impl StreamHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Closes the stream and drops it from the registry. Safe to call repeatedly.
    pub fn cancel(&self) {
        let Some(shutdown) = &self.shutdown else {
            return;
        };
        if shutdown.shutdown() {
            debug!(run_id = %self.run_id, "stream cancelled");
            self.registry.remove_if(&self.run_id, self.generation);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.as_ref().is_none_or(|s| s.is_shutdown())
    }
}

/// Session-scoped owner of all agent-run streams.
pub struct StreamManager {
    transport: Arc<dyn RunTransport>,
    registry: Arc<RunRegistry>,
    config: StreamConfig,
    runtime: Handle,
    generation: AtomicU64,
}

impl StreamManager {
    pub fn new(
        transport: Arc<dyn RunTransport>,
        config: StreamConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            registry: Arc::new(RunRegistry::new()),
            transport,
            config,
            runtime,
            generation: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Follows a run's event stream.
    ///
    /// Callbacks always run on the runtime, never inside this call.
    pub fn stream_agent(
        &self,
        run_id: &str,
        callbacks: StreamCallbacks,
    ) -> StreamHandle {
        let run_id = run_id.to_string();

        if self.registry.is_non_running(&run_id) {
            info!(run_id = %run_id, "run already ended, stream not opened");
            let message = format!("Agent run {} is not running", run_id);
            let mut callbacks = callbacks;
            self.runtime.spawn(async move {
                callbacks.error(FlowdeckError::Stream(message));
                callbacks.close();
            });
            return StreamHandle {
                run_id,
                generation: 0,
                shutdown: None,
                registry: self.registry.clone(),
            };
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let active = ActiveStream::new(generation);
        let previous = self.registry.replace(&run_id, active.clone());
        if let Some(previous) = &previous {
            debug!(run_id = %run_id, replaced = previous.generation, "closing previous stream");
            previous.shutdown.shutdown();
        }

        let task = StreamTask {
            run_id: run_id.clone(),
            generation,
            transport: self.transport.clone(),
            registry: self.registry.clone(),
            reconnect_delay: Duration::from_millis(self.config.reconnect_delay_ms),
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            callbacks,
            shutdown: active.shutdown.clone(),
            done: active.done,
            previous: previous.map(|p| p.done),
        };
        self.runtime.spawn(task.run());

        StreamHandle {
            run_id,
            generation,
            shutdown: Some(active.shutdown),
            registry: self.registry.clone(),
        }
    }

    /// Marks the run ended and closes its stream, if any.
    pub fn stop(
        &self,
        run_id: &str,
    ) -> bool {
        self.registry.mark_non_running(run_id);
        match self.registry.take(run_id) {
            Some(active) => {
                active.shutdown.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn is_active(
        &self,
        run_id: &str,
    ) -> bool {
        self.registry.is_active(run_id)
    }

    pub fn is_non_running(
        &self,
        run_id: &str,
    ) -> bool {
        self.registry.is_non_running(run_id)
    }
}

/// What a status re-check said about the run.
enum RunState {
    Running,
    Ended,
    Unknown(FlowdeckError),
}

/// How one connection ended.
enum Disconnect {
    /// terminal frame or cancellation, nothing more to do
    Finished,
    /// error or end of stream without a terminal frame
    Dropped,
}

struct StreamTask {
    run_id: RunId,
    generation: u64,
    transport: Arc<dyn RunTransport>,
    registry: Arc<RunRegistry>,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    callbacks: StreamCallbacks,
    shutdown: Arc<Shutdown>,
    done: Arc<Shutdown>,
    previous: Option<Arc<Shutdown>>,
}

impl StreamTask {
    async fn run(mut self) {
        if let Some(previous) = self.previous.take() {
            previous.wait().await;
        }

        self.follow().await;

        self.registry.remove_if(&self.run_id, self.generation);
        self.callbacks.close();
        self.done.shutdown();
        debug!(run_id = %self.run_id, generation = self.generation, "stream closed");
    }

    async fn follow(&mut self) {
        match self.check_status().await {
            Some(RunState::Running) => {}
            Some(RunState::Ended) => {
                let message = format!("Agent run {} is not running", self.run_id);
                self.callbacks.error(FlowdeckError::Stream(message));
                return;
            }
            Some(RunState::Unknown(err)) => {
                warn!(run_id = %self.run_id, error = %err, "run status check failed");
                self.callbacks.error(err);
                return;
            }
            None => return,
        }

        let mut attempts = 0;
        loop {
            match self.connect(&mut attempts).await {
                Disconnect::Finished => return,
                Disconnect::Dropped => {}
            }

            match self.check_status().await {
                Some(RunState::Running) => {}
                Some(RunState::Ended) | None => return,
                Some(RunState::Unknown(err)) => {
                    debug!(run_id = %self.run_id, error = %err, "status unknown after disconnect, retrying");
                }
            }

            if attempts >= self.max_reconnect_attempts {
                let message = format!("Lost connection to agent run {} after {} reconnect attempts", self.run_id, attempts);
                warn!(run_id = %self.run_id, attempts, "giving up on stream");
                self.callbacks.error(FlowdeckError::Stream(message));
                return;
            }
            attempts += 1;

            tokio::select! {
                _ = self.shutdown.wait() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
            info!(run_id = %self.run_id, attempt = attempts, "reconnecting stream");
        }
    }

    /// Asks the backend whether the run is alive. `None` means cancelled.
    async fn check_status(&mut self) -> Option<RunState> {
        if self.shutdown.is_shutdown() {
            return None;
        }

        let status = tokio::select! {
            _ = self.shutdown.wait() => return None,
            status = self.transport.run_status(&self.run_id) => status,
        };

        let state = match status {
            Ok(run) if run.is_running() => RunState::Running,
            Ok(run) => {
                debug!(run_id = %self.run_id, status = run.status.as_ref(), "run not running");
                self.registry.mark_non_running(&self.run_id);
                RunState::Ended
            }
            Err(err) if err.is_not_found() => {
                debug!(run_id = %self.run_id, "run not found");
                self.registry.mark_non_running(&self.run_id);
                RunState::Ended
            }
            Err(err) => RunState::Unknown(err),
        };
        Some(state)
    }

    /// Opens one connection and pumps its frames until it ends.
    async fn connect(
        &mut self,
        attempts: &mut u32,
    ) -> Disconnect {
        let opened = tokio::select! {
            _ = self.shutdown.wait() => return Disconnect::Finished,
            opened = self.transport.open_stream(&self.run_id) => opened,
        };
        let mut frames = match opened {
            Ok(frames) => frames,
            Err(err) => {
                debug!(run_id = %self.run_id, error = %err, "failed to open stream");
                return Disconnect::Dropped;
            }
        };

        loop {
            let next = tokio::select! {
                _ = self.shutdown.wait() => return Disconnect::Finished,
                next = frames.next() => next,
            };

            match next {
                Some(Ok(raw)) => {
                    *attempts = 0;
                    if self.dispatch(raw) {
                        return Disconnect::Finished;
                    }
                }
                Some(Err(err)) => {
                    debug!(run_id = %self.run_id, error = %err, "stream transport error");
                    return Disconnect::Dropped;
                }
                None => {
                    debug!(run_id = %self.run_id, "stream ended by server");
                    return Disconnect::Dropped;
                }
            }
        }
    }

    /// Handles one frame. Returns true when the stream is over.
    fn dispatch(
        &mut self,
        raw: String,
    ) -> bool {
        match classify(&raw) {
            Frame::Ping => false,
            Frame::Error(message) => {
                warn!(run_id = %self.run_id, message = %message, "run reported error");
                self.callbacks.error(FlowdeckError::Stream(message));
                false
            }
            Frame::RunNotFound(message) => {
                self.registry.mark_non_running(&self.run_id);
                self.callbacks.error(FlowdeckError::Stream(message));
                true
            }
            Frame::Completed(raw) => {
                info!(run_id = %self.run_id, "run completed");
                self.registry.mark_non_running(&self.run_id);
                self.callbacks.message(raw);
                true
            }
            Frame::Message(raw) => {
                self.callbacks.message(raw);
                false
            }
        }
    }
}
