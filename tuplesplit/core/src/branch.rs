//! Branches
//!
//! A [`Branch`] is one tuple position exposed as its own sequence. It talks
//! to the driver through a rendezvous: `next()` sends a one-shot reply slot
//! on the branch's request channel (the request), and the driver answers by
//! sending the round's value through that slot (the delivery). Nothing is
//! buffered; the driver only answers requests it has already received.
//!
//! The driver half of the pair is a [`BranchPort`]. Ports and branches are
//! created together by [`branch_pair`].

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::outcome::{SplitError, Terminal, TerminalCell, TerminalOutcome};

/// Reply slot a branch hands to the driver with each request
pub(crate) type Reply<V> = oneshot::Sender<V>;

/// Consumer-facing sequence for one tuple position
pub struct Branch<V, E> {
    index: usize,
    width: usize,
    requests: mpsc::Sender<Reply<V>>,
    /// Delivery slot for a request the driver has not answered yet
    pending: Option<oneshot::Receiver<V>>,
    terminal: Arc<TerminalCell<E>>,
    received: u64,
}

impl<V, E> Branch<V, E> {
    /// Position of this branch within the tuple
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Width of the splitter this branch belongs to
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of values delivered to this branch so far
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// The splitter's terminal outcome, if it has ended (never suspends)
    ///
    /// A value delivered before the outcome was settled can still be waiting
    /// in this branch; `next()` returns it before the outcome.
    #[must_use]
    pub fn outcome(&self) -> Option<Terminal<E>> {
        self.terminal.get()
    }

    /// Whether the splitter has ended
    ///
    /// Like [`Branch::outcome`], this does not account for a delivered value
    /// that `next()` has not handed out yet.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal.get().is_some()
    }

    /// Pull the next value for this position
    ///
    /// Returns the terminal outcome once the splitter has ended; from then on
    /// every call returns that same outcome immediately.
    ///
    /// Cancel safe: if the returned future is dropped while waiting, the
    /// request stays outstanding and the next call picks up its delivery,
    /// even if the splitter ended in the meantime.
    pub async fn next(&mut self) -> Result<V, Terminal<E>> {
        if self.pending.is_none() {
            if let Some(terminal) = self.terminal.get() {
                return Err(terminal);
            }

            let (reply, delivery) = oneshot::channel();
            if self.requests.send(reply).await.is_err() {
                return Err(self.settled());
            }
            self.pending = Some(delivery);
        }

        let Some(delivery) = self.pending.as_mut() else {
            return Err(self.settled());
        };
        let delivered = delivery.await;
        self.pending = None;

        match delivered {
            Ok(value) => {
                self.received += 1;
                Ok(value)
            }
            Err(_) => Err(self.settled()),
        }
    }

    /// Stop consuming this branch
    ///
    /// The driver stops waiting on a closed branch, so the remaining branches
    /// keep advancing. Dropping a branch has the same effect.
    pub fn close(self) {
        tracing::debug!(
            branch = self.index,
            received = self.received,
            "Branch closed by consumer"
        );
    }

    /// The outcome stored by the driver
    ///
    /// The driver records its outcome before its channels close, so the cell
    /// is normally set here; `DriverLost` only covers a driver that vanished
    /// without running its teardown.
    fn settled(&self) -> Terminal<E> {
        self.terminal
            .settle(TerminalOutcome::Failed(SplitError::DriverLost))
    }
}

impl<V, E> Branch<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Turn the branch into a `Stream`
    ///
    /// The stream ends after the last value when the source is exhausted. On
    /// failure it yields the outcome once as `Err` and then ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<V, Terminal<E>>> + Send {
        futures::stream::unfold(Some(self), |branch| async move {
            let mut branch = branch?;
            match branch.next().await {
                Ok(value) => Some((Ok(value), Some(branch))),
                Err(terminal) if terminal.is_exhausted() => None,
                Err(terminal) => Some((Err(terminal), None)),
            }
        })
    }
}

impl<V, E> fmt::Debug for Branch<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("received", &self.received)
            .field("pending", &self.pending.is_some())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Driver-side half of a branch
pub(crate) struct BranchPort<V> {
    index: usize,
    requests: mpsc::Receiver<Reply<V>>,
    pending: Option<Reply<V>>,
    closed: bool,
}

impl<V> BranchPort<V> {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait until this branch has an outstanding request
    ///
    /// Returns `false` once the branch is closed; a closed port never blocks
    /// again.
    pub(crate) async fn await_request(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.pending.is_some() {
            return true;
        }
        match self.requests.recv().await {
            Some(reply) => {
                self.pending = Some(reply);
                true
            }
            None => {
                self.close();
                false
            }
        }
    }

    /// Resolve once the branch can no longer take a delivery
    ///
    /// Picks up a queued request first if there is none outstanding, then
    /// waits for the branch to drop its delivery slot. A branch that keeps a
    /// request outstanding never resolves this.
    pub(crate) async fn closed(&mut self) {
        if !self.await_request().await {
            return;
        }
        if let Some(reply) = self.pending.as_mut() {
            reply.closed().await;
        }
    }

    /// Answer the outstanding request with `value`
    ///
    /// Returns `false` if the branch went away before the delivery landed,
    /// in which case the port is closed.
    pub(crate) fn deliver(&mut self, value: V) -> bool {
        let delivered = match self.pending.take() {
            Some(reply) => reply.send(value).is_ok(),
            None => false,
        };
        if !delivered {
            self.close();
        }
        delivered
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending = None;
            tracing::debug!(branch = self.index, "Branch released from barrier");
        }
    }
}

/// Create a connected branch and driver port for position `index`
pub(crate) fn branch_pair<V, E>(
    index: usize,
    width: usize,
    terminal: Arc<TerminalCell<E>>,
) -> (Branch<V, E>, BranchPort<V>) {
    // One slot: a branch never has more than one request in flight.
    let (tx, rx) = mpsc::channel(1);

    let branch = Branch {
        index,
        width,
        requests: tx,
        pending: None,
        terminal,
        received: 0,
    };
    let port = BranchPort {
        index,
        requests: rx,
        pending: None,
        closed: false,
    };

    (branch, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    fn pair() -> (Branch<u32, String>, BranchPort<u32>, Arc<TerminalCell<String>>) {
        let cell = Arc::new(TerminalCell::new());
        let (branch, port) = branch_pair(0, 1, Arc::clone(&cell));
        (branch, port, cell)
    }

    #[tokio::test]
    async fn test_request_then_delivery() {
        let (mut branch, mut port, _cell) = pair();

        let driver = tokio::spawn(async move {
            assert!(port.await_request().await);
            assert!(port.deliver(42));
            port
        });

        assert_eq!(branch.next().await.ok(), Some(42));
        assert_eq!(branch.received(), 1);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_next_keeps_request() {
        let (mut branch, mut port, _cell) = pair();

        // Nobody answers yet: the first call times out with its request queued.
        let attempt = tokio::time::timeout(Duration::from_millis(20), branch.next()).await;
        assert!(attempt.is_err());

        assert!(port.await_request().await);
        assert!(port.deliver(7));

        // The retry reuses the outstanding request instead of sending another.
        assert_eq!(branch.next().await.ok(), Some(7));
        assert!(port.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_terminal_is_sticky() {
        let (mut branch, port, cell) = pair();

        cell.settle(TerminalOutcome::Exhausted);
        drop(port);

        let first = branch.next().await.unwrap_err();
        assert!(first.is_exhausted());

        let again = branch.next().now_or_never().expect("must not suspend");
        assert!(again.unwrap_err().ptr_eq(&first));
    }

    #[tokio::test]
    async fn test_delivered_value_survives_driver_loss() {
        let (mut branch, mut port, cell) = pair();

        let attempt = tokio::time::timeout(Duration::from_millis(20), branch.next()).await;
        assert!(attempt.is_err());

        assert!(port.await_request().await);
        assert!(port.deliver(5));
        cell.settle(TerminalOutcome::Failed(SplitError::DriverLost));
        drop(port);
        assert!(branch.is_terminated());

        assert_eq!(branch.next().await.ok(), Some(5));
        let terminal = branch.next().await.unwrap_err();
        assert!(matches!(terminal.error(), Some(SplitError::DriverLost)));
    }

    #[tokio::test]
    async fn test_port_closed_resolves_when_branch_drops() {
        let (mut branch, mut port, _cell) = pair();

        let attempt = tokio::time::timeout(Duration::from_millis(20), branch.next()).await;
        assert!(attempt.is_err());

        let mut closed = tokio_test::task::spawn(port.closed());
        tokio_test::assert_pending!(closed.poll());
        drop(branch);
        assert!(closed.is_woken());
        tokio_test::assert_ready!(closed.poll());
    }

    #[tokio::test]
    async fn test_dropped_port_without_outcome_reports_driver_lost() {
        let (mut branch, port, _cell) = pair();
        drop(port);

        let terminal = branch.next().await.unwrap_err();
        assert!(matches!(terminal.error(), Some(SplitError::DriverLost)));
    }

    #[tokio::test]
    async fn test_port_detects_closed_branch() {
        let (branch, mut port, _cell) = pair();
        branch.close();

        assert!(!port.await_request().await);
        assert!(port.is_closed());
        assert!(!port.await_request().await);
    }

    #[tokio::test]
    async fn test_into_stream_stops_on_exhaustion() {
        use futures::StreamExt;

        let (branch, mut port, cell) = pair();

        let driver = tokio::spawn(async move {
            for value in [1, 2] {
                assert!(port.await_request().await);
                assert!(port.deliver(value));
            }
            assert!(port.await_request().await);
            cell.settle(TerminalOutcome::Exhausted);
        });

        let values: Vec<u32> = branch
            .into_stream()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![1, 2]);
        driver.await.unwrap();
    }
}
