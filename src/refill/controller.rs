use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    config::RefillConfig,
    error::{AppError, AppResult},
    models::PoolItem,
    refill::{
        fetcher::ItemFetcher,
        machine::{RefillAction, RefillMachine},
    },
};

/// Output of the refill loop
#[derive(Debug, Clone, PartialEq)]
pub enum RefillEvent {
    /// Fresh items to append to the queue
    Items(Vec<PoolItem>),
    /// Non-blocking message about a failed or empty refill
    Notice(String),
}

enum Command {
    Depth(usize),
    Shutdown,
}

enum Completion {
    Fetched(AppResult<Vec<PoolItem>>),
    CooldownElapsed,
}

/// Timing knobs for the refill loop
#[derive(Debug, Clone, Copy)]
pub struct RefillSettings {
    pub threshold: usize,
    pub cooldown: Duration,
    pub fetch_timeout: Duration,
}

impl Default for RefillSettings {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown: Duration::from_secs(3),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&RefillConfig> for RefillSettings {
    fn from(config: &RefillConfig) -> Self {
        Self {
            threshold: config.refill_threshold,
            cooldown: Duration::from_millis(config.refill_cooldown_ms),
            fetch_timeout: Duration::from_millis(config.refill_fetch_timeout_ms),
        }
    }
}

/// Handle to a running refill loop
pub struct RefillHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl RefillHandle {
    /// Reports the current queue length
    pub fn observe_depth(&self, depth: usize) {
        if self.commands.send(Command::Depth(depth)).is_err() {
            tracing::debug!(depth, "Refill loop already stopped");
        }
    }

    /// Stops the loop, cancelling any in-flight fetch and pending cooldown
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Refill loop ended abnormally");
        }
    }
}

/// Single task that owns the [`RefillMachine`] and executes its actions.
///
/// Depth observations and fetch/cooldown completions are handled one at a time,
/// so the machine needs no locking.
pub struct RefillController {
    machine: RefillMachine,
    fetcher: Arc<dyn ItemFetcher>,
    fetch_timeout: Duration,
    events: mpsc::UnboundedSender<RefillEvent>,
    completions: mpsc::UnboundedSender<Completion>,
    pending_fetch: Option<JoinHandle<()>>,
    pending_cooldown: Option<JoinHandle<()>>,
}

impl RefillController {
    /// Spawns the loop. Events are delivered on the returned receiver.
    pub fn spawn(
        fetcher: Arc<dyn ItemFetcher>,
        settings: RefillSettings,
    ) -> (RefillHandle, mpsc::UnboundedReceiver<RefillEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let controller = Self {
            machine: RefillMachine::new(settings.threshold, settings.cooldown),
            fetcher,
            fetch_timeout: settings.fetch_timeout,
            events: event_tx,
            completions: completion_tx,
            pending_fetch: None,
            pending_cooldown: None,
        };

        let task = tokio::spawn(controller.run(command_rx, completion_rx));

        (
            RefillHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Depth(depth)) => {
                        let action = self.machine.observe_depth(depth);
                        self.execute(action);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(completion) = completions.recv() => self.complete(completion),
            }
        }

        self.cancel_pending();
        tracing::debug!("Refill loop stopped");
    }

    fn complete(&mut self, completion: Completion) {
        let action = match completion {
            Completion::Fetched(Ok(items)) => {
                self.pending_fetch = None;
                let appended = items.len();
                if appended > 0 {
                    tracing::debug!(appended, "Refill fetched items");
                    self.emit(RefillEvent::Items(items));
                } else {
                    tracing::info!("Refill returned no items, pool exhausted");
                    self.emit(RefillEvent::Notice(
                        "No more items available right now".to_string(),
                    ));
                }
                self.machine.fetch_succeeded(appended)
            }
            Completion::Fetched(Err(e)) => {
                self.pending_fetch = None;
                tracing::warn!(error = %e, "Refill fetch failed");
                self.emit(RefillEvent::Notice(format!("Could not load more items: {}", e)));
                self.machine.fetch_failed(e.to_string())
            }
            Completion::CooldownElapsed => {
                self.pending_cooldown = None;
                self.machine.cooldown_elapsed()
            }
        };

        self.execute(action);
    }

    fn execute(&mut self, action: RefillAction) {
        match action {
            RefillAction::None => {}
            RefillAction::Fetch => {
                let fetcher = self.fetcher.clone();
                let completions = self.completions.clone();
                let timeout = self.fetch_timeout;

                self.pending_fetch = Some(tokio::spawn(async move {
                    let result = match tokio::time::timeout(timeout, fetcher.fetch()).await {
                        Ok(result) => result,
                        Err(_) => Err(AppError::ExternalApi(format!(
                            "refill fetch timed out after {}ms",
                            timeout.as_millis()
                        ))),
                    };
                    let _ = completions.send(Completion::Fetched(result));
                }));
            }
            RefillAction::StartCooldown(delay) => {
                let completions = self.completions.clone();
                self.pending_cooldown = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = completions.send(Completion::CooldownElapsed);
                }));
            }
        }
    }

    fn emit(&self, event: RefillEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Refill event dropped, no listener");
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending_fetch.take() {
            task.abort();
        }
        if let Some(task) = self.pending_cooldown.take() {
            task.abort();
        }
    }
}
