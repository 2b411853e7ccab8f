//! Splitter Construction
//!
//! [`split`] pulls the first tuple to learn the width, builds one [`Branch`]
//! per position, and spawns the driver task exactly once. The returned
//! [`Splitter`] owns the branches; its [`SplitterHandle`] observes the
//! driver without touching the source.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::branch::{branch_pair, Branch};
use crate::config::SplitterConfig;
use crate::driver::{Driver, DriverState};
use crate::outcome::{SplitError, Terminal, TerminalCell};
use crate::source::{PullSource, TupleSource};

/// Split `source` into one branch per tuple position
///
/// Must be called from within a tokio runtime; the driver is spawned onto it.
///
/// # Errors
///
/// - [`SplitError::EmptySource`] if the source ends before its first tuple
/// - [`SplitError::ZeroWidth`] if the first tuple is empty
/// - [`SplitError::Source`] if the first pull fails
pub async fn split<V, E>(source: TupleSource<V, E>) -> Result<Splitter<V, E>, SplitError<E>>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    split_with_config(source, SplitterConfig::default()).await
}

/// [`split`] with an explicit [`SplitterConfig`]
///
/// # Errors
///
/// Same as [`split`].
pub async fn split_with_config<V, E>(
    mut source: TupleSource<V, E>,
    config: SplitterConfig,
) -> Result<Splitter<V, E>, SplitError<E>>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    let first = match source.pull().await {
        Some(Ok(tuple)) => tuple,
        Some(Err(e)) => return Err(SplitError::Source(e)),
        None => return Err(SplitError::EmptySource),
    };

    let width = first.len();
    if width == 0 {
        return Err(SplitError::ZeroWidth);
    }

    let terminal = Arc::new(TerminalCell::new());
    let (branches, ports): (Vec<_>, Vec<_>) = (0..width)
        .map(|index| branch_pair(index, width, Arc::clone(&terminal)))
        .unzip();

    let (state_tx, state_rx) = watch::channel(DriverState::AwaitingRound);
    let driver = Driver::new(
        &config,
        source,
        first,
        ports,
        Arc::clone(&terminal),
        state_tx,
    );
    let task = tokio::spawn(driver.run());

    tracing::debug!(splitter = %config.name, width, "Splitter constructed");

    Ok(Splitter {
        branches,
        handle: SplitterHandle {
            name: config.name,
            width,
            state: state_rx,
            terminal,
            abort: task.abort_handle(),
        },
    })
}

/// The branches of one splitter plus a handle on its driver
pub struct Splitter<V, E> {
    branches: Vec<Branch<V, E>>,
    handle: SplitterHandle<E>,
}

impl<V, E> Splitter<V, E> {
    /// Number of branches (the width of the first tuple)
    #[must_use]
    pub fn width(&self) -> usize {
        self.handle.width
    }

    /// Branches in tuple order
    #[must_use]
    pub fn branches(&self) -> &[Branch<V, E>] {
        &self.branches
    }

    /// Mutable access to the branches
    pub fn branches_mut(&mut self) -> &mut [Branch<V, E>] {
        &mut self.branches
    }

    /// Handle on the driver
    #[must_use]
    pub fn handle(&self) -> &SplitterHandle<E> {
        &self.handle
    }

    /// Take the branches, leaving the driver running
    #[must_use]
    pub fn into_branches(self) -> Vec<Branch<V, E>> {
        self.branches
    }

    /// Take the branches and the driver handle
    #[must_use]
    pub fn into_parts(self) -> (Vec<Branch<V, E>>, SplitterHandle<E>) {
        (self.branches, self.handle)
    }
}

impl<V, E> fmt::Debug for Splitter<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("branches", &self.branches)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Observer for a running splitter
pub struct SplitterHandle<E> {
    name: String,
    width: usize,
    state: watch::Receiver<DriverState>,
    terminal: Arc<TerminalCell<E>>,
    abort: AbortHandle,
}

impl<E> SplitterHandle<E> {
    /// Name from the splitter's config
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of branches
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Current driver state
    #[must_use]
    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    /// Whether the driver is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.state().is_stopped()
    }

    /// Terminal outcome, if the splitter has ended
    #[must_use]
    pub fn outcome(&self) -> Option<Terminal<E>> {
        self.terminal.get()
    }

    /// Wait until the driver has stopped
    ///
    /// Returns the terminal outcome, or `None` if the driver stopped because
    /// every branch was closed, including while it was waiting on the source.
    /// As long as one branch stays open and the source never yields, this
    /// does not resolve; [`SplitterHandle::abort`] ends it.
    pub async fn stopped(&self) -> Option<Terminal<E>> {
        let mut state = self.state.clone();
        // An error means the driver (and its sender) is gone, which is also stopped.
        let _ = state.wait_for(|s| s.is_stopped()).await;
        self.terminal.get()
    }

    /// Tear the driver down
    ///
    /// Branches then observe [`SplitError::DriverLost`] unless the splitter
    /// already reached an outcome.
    pub fn abort(&self) {
        tracing::debug!(splitter = %self.name, "Splitter driver abort requested");
        self.abort.abort();
    }
}

impl<E> Clone for SplitterHandle<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            width: self.width,
            state: self.state.clone(),
            terminal: Arc::clone(&self.terminal),
            abort: self.abort.clone(),
        }
    }
}

impl<E> fmt::Debug for SplitterHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitterHandle")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
