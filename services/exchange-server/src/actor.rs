//! The exchange core task and its command channel
//!
//! All mutating entry points funnel into one mpsc channel; the core
//! task processes commands strictly one at a time, which is the state
//! guard. Replies ride oneshot channels back to the caller, and the
//! caller's reply is sent before the burst is enqueued, so a client
//! always learns its own order's fate before any broadcast about it.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use types::events::ExchangeEvent;
use types::order::OrderRequest;

use crate::core::ExchangeCore;

/// Depth of the command channel.
pub const COMMAND_QUEUE_DEPTH: usize = 256;

/// Commands accepted by the core task.
#[derive(Debug)]
pub enum Command {
    /// An inbound, schema-valid order. Replies with the accepted or
    /// rejected response for the submitting connection.
    SubmitOrder {
        order: OrderRequest,
        reply: oneshot::Sender<ExchangeEvent>,
    },
    /// A new gateway connection. Replies with its welcome message.
    Connect {
        reply: oneshot::Sender<ExchangeEvent>,
    },
    /// The round timer fired for `round`. Stale rounds are ignored.
    RoundExpired { round: u64 },
    /// External shutdown request. Replies once finalization is done.
    Interrupt { reply: oneshot::Sender<()> },
}

/// Cheap cloneable handle for talking to the core task.
#[derive(Debug, Clone)]
pub struct ExchangeHandle {
    commands: mpsc::Sender<Command>,
}

impl ExchangeHandle {
    /// Submit an order and wait for its response. Returns None when the
    /// core has already shut down.
    pub async fn submit_order(&self, order: OrderRequest) -> Option<ExchangeEvent> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SubmitOrder { order, reply })
            .await
            .ok()?;
        response.await.ok()
    }

    /// Register a connection and get its welcome message.
    pub async fn connect(&self) -> Option<ExchangeEvent> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Connect { reply }).await.ok()?;
        response.await.ok()
    }

    /// Request an orderly shutdown and wait for finalization.
    pub async fn interrupt(&self) {
        let (reply, done) = oneshot::channel();
        if self
            .commands
            .send(Command::Interrupt { reply })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }
}

/// Spawn the core task. Starts the first round immediately.
pub fn spawn_core(
    core: ExchangeCore,
    events: mpsc::Sender<ExchangeEvent>,
) -> (ExchangeHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let handle = ExchangeHandle {
        commands: commands_tx.clone(),
    };
    let task = tokio::spawn(run_core(core, commands_rx, commands_tx, events));
    (handle, task)
}

async fn run_core(
    mut core: ExchangeCore,
    mut commands: mpsc::Receiver<Command>,
    commands_tx: mpsc::Sender<Command>,
    events: mpsc::Sender<ExchangeEvent>,
) {
    let start_events = core.start_round();
    schedule_round_timer(&core, &commands_tx);
    emit_all(&events, start_events).await;

    while let Some(command) = commands.recv().await {
        match command {
            Command::SubmitOrder { order, reply } => {
                let outcome = core.submit_order(&order);
                // Reply first: the submitter hears its fate before the
                // broadcast burst for the same order goes out.
                let _ = reply.send(outcome.response);
                emit_all(&events, outcome.events).await;
            }
            Command::Connect { reply } => {
                let _ = reply.send(core.connect_trader());
            }
            Command::RoundExpired { round } => {
                let expiry_events = core.handle_round_expiry(round);
                let started_next = expiry_events
                    .iter()
                    .any(|e| matches!(e, ExchangeEvent::SessionStart { .. }));
                emit_all(&events, expiry_events).await;
                if started_next {
                    schedule_round_timer(&core, &commands_tx);
                }
            }
            Command::Interrupt { reply } => {
                let final_events = core.interrupt();
                emit_all(&events, final_events).await;
                let _ = reply.send(());
                break;
            }
        }
    }
    debug!("exchange core task stopped");
    // Dropping the event sender lets the dispatcher drain and stop.
}

/// Arm a one-shot timer for the current round's deadline.
fn schedule_round_timer(core: &ExchangeCore, commands: &mpsc::Sender<Command>) {
    if !core.session().is_active() {
        return;
    }
    let round = core.session().round_id();
    let deadline = tokio::time::Instant::from_std(core.session().ends_at());
    let commands = commands.clone();
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        let _ = commands.send(Command::RoundExpired { round }).await;
    });
}

async fn emit_all(events: &mpsc::Sender<ExchangeEvent>, burst: Vec<ExchangeEvent>) {
    for event in burst {
        // The queue is bounded; backpressure here is the only place the
        // core yields, and it is after all state mutation is complete.
        if events.send(event).await.is_err() {
            return;
        }
    }
}
