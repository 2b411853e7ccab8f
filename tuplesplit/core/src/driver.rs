//! Splitter Driver
//!
//! The driver is the single task that owns the source. Each round it:
//!
//! 1. waits until every open branch has an outstanding request (the barrier),
//! 2. pulls one tuple from the source,
//! 3. hands slice `i` to branch `i`.
//!
//! It does not wait for branches to consume what they were given; the next
//! barrier already waits for each branch's following request, which a
//! consumer can only send after taking the previous value. That keeps every
//! branch within one round of the slowest without any buffering.
//!
//! When the source ends, fails, or yields a tuple of the wrong width, the
//! driver settles one terminal outcome, drops every port so pending and
//! future requests observe it, and stops for good. If every branch closes,
//! whether at the barrier or while a pull is in flight, it stops without an
//! outcome.

use std::sync::Arc;

use tokio::sync::watch;

use crate::branch::BranchPort;
use crate::config::SplitterConfig;
use crate::outcome::{SplitError, TerminalCell, TerminalOutcome};
use crate::source::{PullSource, TupleSource};

/// Externally visible driver state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Waiting for every open branch to request the next round
    AwaitingRound,
    /// Handing the current tuple out to the branches
    Delivering,
    /// Finished; the source will not be pulled again
    Stopped,
}

impl DriverState {
    /// Whether the driver has stopped for good
    #[must_use]
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

pub(crate) struct Driver<V, E> {
    name: String,
    trace_rounds: bool,
    source: TupleSource<V, E>,
    ports: Vec<BranchPort<V>>,
    width: usize,
    /// Tuple pulled during construction, delivered as round 0
    first: Option<Vec<V>>,
    round: u64,
    terminal: Arc<TerminalCell<E>>,
    state: watch::Sender<DriverState>,
    finished: bool,
}

impl<V, E> Driver<V, E>
where
    V: Send,
    E: Send,
{
    pub(crate) fn new(
        config: &SplitterConfig,
        source: TupleSource<V, E>,
        first: Vec<V>,
        ports: Vec<BranchPort<V>>,
        terminal: Arc<TerminalCell<E>>,
        state: watch::Sender<DriverState>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            trace_rounds: config.trace_rounds,
            source,
            width: first.len(),
            ports,
            first: Some(first),
            round: 0,
            terminal,
            state,
            finished: false,
        }
    }

    /// Run rounds until the splitter reaches an outcome or loses every branch
    pub(crate) async fn run(mut self) {
        tracing::debug!(
            splitter = %self.name,
            width = self.width,
            source = %self.source.kind(),
            "Splitter driver started"
        );

        loop {
            self.set_state(DriverState::AwaitingRound);
            let open = self.await_barrier().await;
            if open == 0 {
                tracing::debug!(
                    splitter = %self.name,
                    round = self.round,
                    "All branches closed, stopping without pulling"
                );
                self.finish();
                return;
            }

            let pulled = match self.first.take() {
                Some(tuple) => Some(Ok(tuple)),
                None => match self.pull_unless_abandoned().await {
                    Pulled::Item(pulled) => pulled,
                    Pulled::Abandoned => {
                        tracing::debug!(
                            splitter = %self.name,
                            round = self.round,
                            "All branches closed during pull, stopping"
                        );
                        self.finish();
                        return;
                    }
                },
            };
            let tuple = match pulled {
                Some(Ok(tuple)) => tuple,
                Some(Err(e)) => {
                    self.stop(TerminalOutcome::Failed(SplitError::Source(e)));
                    return;
                }
                None => {
                    self.stop(TerminalOutcome::Exhausted);
                    return;
                }
            };

            if tuple.len() != self.width {
                tracing::warn!(
                    splitter = %self.name,
                    round = self.round,
                    expected = self.width,
                    actual = tuple.len(),
                    "Tuple width mismatch"
                );
                self.stop(TerminalOutcome::Failed(SplitError::WidthMismatch {
                    round: self.round,
                    expected: self.width,
                    actual: tuple.len(),
                }));
                return;
            }

            self.set_state(DriverState::Delivering);
            self.deliver(tuple, open);
            self.round += 1;
        }
    }

    /// Wait for a request from every open branch; returns how many are open
    async fn await_barrier(&mut self) -> usize {
        let mut open = 0;
        for port in &mut self.ports {
            if port.await_request().await {
                open += 1;
            }
        }
        open
    }

    /// Pull the next tuple, giving up if every branch closes while waiting
    async fn pull_unless_abandoned(&mut self) -> Pulled<V, E> {
        tokio::select! {
            pulled = self.source.pull() => Pulled::Item(pulled),
            () = all_closed(&mut self.ports) => Pulled::Abandoned,
        }
    }

    fn deliver(&mut self, tuple: Vec<V>, open: usize) {
        for (port, value) in self.ports.iter_mut().zip(tuple) {
            if port.is_closed() {
                continue;
            }
            if !port.deliver(value) {
                tracing::debug!(
                    splitter = %self.name,
                    round = self.round,
                    branch = port.index(),
                    "Branch dropped before delivery"
                );
            }
        }

        if self.trace_rounds {
            tracing::debug!(
                splitter = %self.name,
                round = self.round,
                open,
                "Round delivered"
            );
        }
    }

    /// Settle the outcome, release every branch, and stop
    fn stop(&mut self, outcome: TerminalOutcome<E>) {
        let terminal = self.terminal.settle(outcome);
        tracing::info!(
            splitter = %self.name,
            rounds = self.round,
            outcome = terminal.label(),
            "Splitter driver stopped"
        );
        self.finish();
    }

    fn finish(&mut self) {
        self.finished = true;
        // Dropping the ports closes every request channel and reply slot.
        self.ports.clear();
        self.set_state(DriverState::Stopped);
    }

    fn set_state(&self, state: DriverState) {
        self.state.send_replace(state);
    }
}

enum Pulled<V, E> {
    Item(Option<Result<Vec<V>, E>>),
    Abandoned,
}

async fn all_closed<V>(ports: &mut [BranchPort<V>]) {
    for port in ports {
        port.closed().await;
    }
}

impl<V, E> Drop for Driver<V, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Runs before the ports drop, so woken branches find the outcome.
        let terminal = self
            .terminal
            .settle(TerminalOutcome::Failed(SplitError::DriverLost));
        tracing::warn!(
            splitter = %self.name,
            rounds = self.round,
            outcome = terminal.label(),
            "Splitter driver dropped before finishing"
        );
        self.state.send_replace(DriverState::Stopped);
    }
}
