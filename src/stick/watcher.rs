//! Background delivery of joystick events
//!
//! "Auto mode" moves the session onto tokio's blocking pool and forwards
//! every decoded event over an mpsc channel. The worker waits for input in
//! short ticks so it notices cancellation and a dropped receiver even while
//! the stick sits idle.
//!
//! The worker ends on a read failure, when the receiver goes away, or when it
//! is cancelled. [`StickWatcher::stop`] hands the still open session back
//! for manual reads; dropping the watcher cancels the worker and the session
//! is closed (grab released) as soon as it returns.

use statum::{machine, state};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::error::StickError;
use super::event::{Action, StickEvent};
use super::session::StickSession;

/// Longest the worker waits for input before checking for cancellation
const POLL_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Stick error: {0}")]
    Stick(#[from] StickError),

    #[error("Failed to spawn watcher: {0}")]
    Spawn(String),

    #[error("Watcher task failed: {0}")]
    Worker(String),
}

/// What the worker hands back when it ends
#[derive(Debug)]
struct WatchOutcome {
    session: StickSession,
    delivered: u64,
    error: Option<StickError>,
}

#[state]
#[derive(Debug, Clone)]
pub enum WatchState {
    Idle,
    Watching,
}

#[machine]
#[derive(Debug)]
pub struct StickWatcher<S: WatchState> {
    // Both moved into the worker on start
    session: Option<StickSession>,
    event_sender: Option<mpsc::Sender<StickEvent>>,

    cancel: CancellationToken,

    // Cancels the worker when the watcher is dropped
    cancel_guard: Option<DropGuard>,

    worker: Option<JoinHandle<WatchOutcome>>,
}

impl StickWatcher<Idle> {
    /// Takes ownership of an opened session
    pub fn create(
        session: StickSession,
        event_sender: mpsc::Sender<StickEvent>,
    ) -> Result<Self, WatcherError> {
        if session.is_failed() {
            let reason = session.failure().unwrap_or_default().to_string();
            error!("Refusing to watch failed session: {}", reason);
            return Err(StickError::SessionFailed(reason).into());
        }

        debug!("Creating StickWatcher for {}", session.path().display());
        Ok(Self::new(
            Some(session),
            Some(event_sender),
            CancellationToken::new(),
            None,
            None,
        ))
    }

    /// Spawns the blocking worker and transitions to Watching
    pub fn start(mut self) -> Result<StickWatcher<Watching>, WatcherError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WatcherError::Spawn(e.to_string()))?;

        let session = self
            .session
            .take()
            .ok_or_else(|| WatcherError::Spawn("session already taken".to_string()))?;
        let sender = self
            .event_sender
            .take()
            .ok_or_else(|| WatcherError::Spawn("sender already taken".to_string()))?;
        let cancel = self.cancel.clone();
        let worker_runtime = runtime.clone();

        info!("Starting stick watcher on {}", session.path().display());
        self.worker = Some(
            runtime.spawn_blocking(move || watch_loop(session, sender, cancel, worker_runtime)),
        );
        self.cancel_guard = Some(self.cancel.clone().drop_guard());

        Ok(self.transition())
    }
}

impl StickWatcher<Watching> {
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    async fn finish(&mut self) -> Result<WatchOutcome, WatcherError> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| WatcherError::Worker("worker already joined".to_string()))?;
        worker
            .await
            .map_err(|e| WatcherError::Worker(e.to_string()))
    }

    /// Waits for the worker to end on its own and returns how many events it
    /// delivered. The session is closed by then.
    pub async fn join(mut self) -> Result<u64, WatcherError> {
        let outcome = self.finish().await?;
        match outcome.error {
            Some(e) => Err(e.into()),
            None => Ok(outcome.delivered),
        }
    }

    /// Cancels the worker and returns the session for manual reads. The
    /// session keeps its grab if the worker was still running.
    pub async fn stop(mut self) -> Result<StickSession, WatcherError> {
        self.cancel.cancel();
        let outcome = self.finish().await?;
        debug!("Watcher stopped after {} events", outcome.delivered);
        match outcome.error {
            Some(e) => Err(e.into()),
            None => Ok(outcome.session),
        }
    }
}

enum Delivery {
    Sent,
    ReceiverGone,
    Cancelled,
}

fn watch_loop(
    mut session: StickSession,
    sender: mpsc::Sender<StickEvent>,
    cancel: CancellationToken,
    runtime: tokio::runtime::Handle,
) -> WatchOutcome {
    let mut delivered = 0u64;

    loop {
        if cancel.is_cancelled() {
            debug!("Stick watcher cancelled");
            break;
        }
        if sender.is_closed() {
            info!("Event receiver dropped, stopping stick watcher");
            session.close();
            break;
        }

        let event = match session.poll_next(POLL_TICK) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("Stick watcher stopping after {} events: {}", delivered, e);
                session.close();
                return WatchOutcome {
                    session,
                    delivered,
                    error: Some(e),
                };
            }
        };

        if event.action == Action::Press {
            info!("Stick {:?} pressed", event.direction);
        }

        let delivery = runtime.block_on(async {
            tokio::select! {
                _ = cancel.cancelled() => Delivery::Cancelled,
                sent = sender.send(event) => match sent {
                    Ok(()) => Delivery::Sent,
                    Err(_) => Delivery::ReceiverGone,
                },
            }
        });

        match delivery {
            Delivery::Sent => delivered += 1,
            Delivery::ReceiverGone => {
                info!("Event receiver dropped, stopping stick watcher");
                session.close();
                break;
            }
            Delivery::Cancelled => {
                debug!("Stick watcher cancelled with an event in hand");
                break;
            }
        }
    }

    WatchOutcome {
        session,
        delivered,
        error: None,
    }
}

/// Watcher plus the receiving end of its channel
pub struct WatcherHandle {
    watcher: StickWatcher<Watching>,
}

impl WatcherHandle {
    /// Starts watching `session` and returns the event receiver
    pub fn spawn(
        session: StickSession,
        buffer: usize,
    ) -> Result<(Self, mpsc::Receiver<StickEvent>), WatcherError> {
        let (tx, rx) = mpsc::channel(buffer);
        let watcher = StickWatcher::create(session, tx)?.start()?;
        Ok((Self { watcher }, rx))
    }

    pub fn is_finished(&self) -> bool {
        self.watcher.is_finished()
    }

    pub async fn join(self) -> Result<u64, WatcherError> {
        self.watcher.join().await
    }

    /// Switches back to manual mode
    pub async fn stop(self) -> Result<StickSession, WatcherError> {
        self.watcher.stop().await
    }
}
