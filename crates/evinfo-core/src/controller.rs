//! Session controller: runs a [`Scheduler`] against a live transport.
//!
//! The controller is a single background task that owns the scheduler, the
//! transport's write half and the record sink. Transport events, control
//! messages and scheduler deadlines are serialized through one
//! `tokio::select!` loop, so the scheduler never sees concurrent input.
//!
//! Observers get:
//! - the latest [`VehicleState`] through a `watch` channel,
//! - every [`SessionEvent`] through a broadcast channel,
//! - decoded values as a [`Stream`] via [`Controller::telemetry_stream`].
//!
//! Dropping the [`Controller`] cancels the task; [`Controller::shutdown`]
//! does the same and waits for the final record flush.

use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use evinfo_types::TelemetryValue;

use crate::catalog::CommandCatalog;
use crate::config::{MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, SessionConfig};
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, EventDispatcher, EventReceiver, SessionEvent};
use crate::scheduler::{Action, Phase, Scheduler};
use crate::state::VehicleState;
use crate::traits::{RecordSink, Transport, TransportEvent};

/// Runtime requests to a running session.
#[derive(Debug, Clone, PartialEq)]
enum ControlMessage {
    SetPollInterval(Duration),
    ResetDistance,
}

/// Handle to a running polling session.
pub struct Controller {
    control: mpsc::UnboundedSender<ControlMessage>,
    state: watch::Receiver<VehicleState>,
    phase: watch::Receiver<Phase>,
    dispatcher: EventDispatcher,
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("phase", &*self.phase.borrow())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Controller {
    /// Start a session task.
    ///
    /// `events` must be the receiving end of the channel `transport` reports
    /// on. The session stays idle until the transport reports a connection.
    ///
    /// Subscribe to events right after spawning to see the whole session.
    pub fn spawn<T, S>(
        transport: T,
        events: mpsc::Receiver<TransportEvent>,
        sink: S,
        config: SessionConfig,
        catalog: CommandCatalog,
    ) -> Result<Self>
    where
        T: Transport + 'static,
        S: RecordSink + 'static,
    {
        config.ensure_valid()?;

        let dispatcher = EventDispatcher::new(config.event_capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(VehicleState::new());
        let (phase_tx, phase_rx) = watch::channel(Phase::Idle);
        let cancel_token = CancellationToken::new();

        let session = Session {
            scheduler: Scheduler::new(config, catalog),
            transport,
            sink,
            dispatcher: dispatcher.clone(),
            state_tx,
            phase_tx,
        };
        let handle = tokio::spawn(session.run(events, control_rx, cancel_token.clone()));

        Ok(Self {
            control: control_tx,
            state: state_rx,
            phase: phase_rx,
            dispatcher,
            handle: Some(handle),
            cancel_token,
        })
    }

    /// Change the poll interval of the running session.
    pub fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        let ms = interval.as_millis();
        if ms < u128::from(MIN_POLL_INTERVAL_MS) || ms > u128::from(MAX_POLL_INTERVAL_MS) {
            return Err(Error::invalid_config(format!(
                "poll interval {interval:?} outside {MIN_POLL_INTERVAL_MS}..={MAX_POLL_INTERVAL_MS} ms"
            )));
        }
        self.send(ControlMessage::SetPollInterval(interval))
    }

    /// Restart trip distance from the current odometer reading.
    pub fn reset_distance(&self) -> Result<()> {
        self.send(ControlMessage::ResetDistance)
    }

    fn send(&self, message: ControlMessage) -> Result<()> {
        self.control.send(message).map_err(|_| Error::Cancelled)
    }

    /// Copy of the latest vehicle state.
    pub fn snapshot(&self) -> VehicleState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified whenever the vehicle state changes.
    pub fn watch_state(&self) -> watch::Receiver<VehicleState> {
        self.state.clone()
    }

    /// Current session phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that is notified on every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> EventReceiver {
        self.dispatcher.subscribe()
    }

    /// Decoded values as a stream.
    ///
    /// Ends when the session task has stopped and the controller is dropped.
    pub fn telemetry_stream(&self) -> impl Stream<Item = TelemetryValue> + Send + 'static {
        stream::unfold(self.dispatcher.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::Telemetry { value }) => return Some((value, rx)),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Telemetry stream lagged, skipped {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Check if the session task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Get the cancellation token for external coordination.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the session, flush the pending record and wait for the task.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("Session task failed: {e}");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// State owned by the session task.
struct Session<T, S> {
    scheduler: Scheduler,
    transport: T,
    sink: S,
    dispatcher: EventDispatcher,
    state_tx: watch::Sender<VehicleState>,
    phase_tx: watch::Sender<Phase>,
}

impl<T: Transport, S: RecordSink> Session<T, S> {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut control: mpsc::UnboundedReceiver<ControlMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            let deadline = self.scheduler.next_deadline();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Session cancelled, stopping gracefully");
                    self.scheduler.shutdown(Instant::now());
                    self.perform().await;
                    break;
                }
                Some(message) = control.recv() => self.handle_control(message),
                event = events.recv() => match event {
                    Some(event) => self.handle_transport(event),
                    None => {
                        debug!("Transport event channel closed, stopping");
                        self.scheduler
                            .on_disconnected(Instant::now(), DisconnectReason::TransportClosed);
                        self.perform().await;
                        break;
                    }
                },
                () = wait_for(deadline) => self.scheduler.on_timer(Instant::now()),
            }

            self.perform().await;
        }
    }

    fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::SetPollInterval(interval) => {
                self.scheduler.set_poll_interval(interval, Instant::now());
            }
            ControlMessage::ResetDistance => self.scheduler.reset_distance(),
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        let now = Instant::now();
        match event {
            TransportEvent::Connected => self.scheduler.on_connected(now),
            TransportEvent::Disconnected => {
                self.scheduler
                    .on_disconnected(now, DisconnectReason::TransportClosed);
            }
            TransportEvent::Data(bytes) => self.scheduler.on_data(&bytes, now),
        }
    }

    /// Carry out everything the scheduler asked for.
    async fn perform(&mut self) {
        loop {
            let actions = self.scheduler.drain_actions();
            if actions.is_empty() {
                break;
            }
            for action in actions {
                match action {
                    Action::Send(command) => {
                        if self.scheduler.phase() == Phase::Idle {
                            debug!("Dropping {:?}, session is idle", command.trim_end());
                            continue;
                        }
                        if let Err(e) = self.transport.send(command.as_bytes()).await {
                            error!("Failed to write {:?}: {e}", command.trim_end());
                            self.scheduler.on_disconnected(
                                Instant::now(),
                                DisconnectReason::WriteFailed(e.to_string()),
                            );
                        }
                    }
                    Action::Persist(record) => self.sink.save(record),
                    Action::Notify(event) => {
                        if let SessionEvent::PhaseChanged { phase } = &event {
                            self.phase_tx.send_replace(*phase);
                        }
                        self.dispatcher.send(event);
                    }
                }
            }
        }

        let latest = self.scheduler.vehicle_state();
        self.state_tx.send_if_modified(|state| {
            if *state == *latest {
                false
            } else {
                state.clone_from(latest);
                true
            }
        });
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
