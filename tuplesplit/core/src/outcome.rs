//! Terminal Outcomes and Splitter Errors
//!
//! A splitter ends exactly once. The driver turns whatever ended the source
//! (normal exhaustion, a source error, a malformed tuple) into one
//! [`TerminalOutcome`], stores it in a write-once [`TerminalCell`], and every
//! branch hands out clones of that same [`Terminal`] handle from then on.
//!
//! Because every branch references the one stored value, outcomes are
//! identical across branches (`Terminal::ptr_eq` holds) and sticky: a branch
//! that has seen the outcome sees it again on every later call without
//! suspending.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by a splitter
///
/// `Source`, `WidthMismatch` and `DriverLost` arrive on branches as failed
/// terminal outcomes. `EmptySource`, `ZeroWidth` and `Source` (for the very
/// first pull) are also returned directly from construction.
#[derive(Debug, Error)]
pub enum SplitError<E> {
    /// The source reported an error; the payload is forwarded unchanged
    #[error("source failed: {0}")]
    Source(E),

    /// A tuple after the first had a different width
    #[error("tuple {round} has width {actual}, expected {expected}")]
    WidthMismatch {
        /// Zero-based round of the offending tuple
        round: u64,
        /// Width learned from the first tuple
        expected: usize,
        /// Width of the offending tuple
        actual: usize,
    },

    /// The driver went away without reaching an outcome (aborted or panicked)
    #[error("splitter driver stopped before reaching a terminal outcome")]
    DriverLost,

    /// The source ended before producing its first tuple
    #[error("source produced no tuples")]
    EmptySource,

    /// The first tuple had no positions, so there is nothing to split into
    #[error("first tuple has zero width")]
    ZeroWidth,
}

impl<E> SplitError<E> {
    /// The source payload, if this error came from the source
    #[must_use]
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::Source(e) => Some(e),
            _ => None,
        }
    }

    /// Short label for structured logging
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Source(_) => "source_error",
            Self::WidthMismatch { .. } => "width_mismatch",
            Self::DriverLost => "driver_lost",
            Self::EmptySource => "empty_source",
            Self::ZeroWidth => "zero_width",
        }
    }
}

// ============================================================================
// Terminal Outcome
// ============================================================================

/// How a splitter ended
#[derive(Debug)]
pub enum TerminalOutcome<E> {
    /// The source ended normally
    Exhausted,
    /// The splitter failed; no further values will be delivered
    Failed(SplitError<E>),
}

impl<E> TerminalOutcome<E> {
    /// Whether the source ended normally
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// The failure, if the splitter did not end normally
    #[must_use]
    pub fn error(&self) -> Option<&SplitError<E>> {
        match self {
            Self::Exhausted => None,
            Self::Failed(e) => Some(e),
        }
    }

    /// Short label for structured logging
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Failed(e) => e.label(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for TerminalOutcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "source exhausted"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Shared handle to the outcome stored for one splitter
///
/// Cloning is cheap; all clones point at the same [`TerminalOutcome`].
#[derive(Debug)]
pub struct Terminal<E>(Arc<TerminalOutcome<E>>);

impl<E> Terminal<E> {
    /// Whether two handles refer to the same stored outcome
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Clone for Terminal<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> Deref for Terminal<E> {
    type Target = TerminalOutcome<E>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E: fmt::Display> fmt::Display for Terminal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Terminal<E> {}

// ============================================================================
// Terminal Cell
// ============================================================================

/// Write-once slot holding a splitter's outcome
///
/// The first `settle` wins; later calls return the stored handle unchanged.
#[derive(Debug)]
pub(crate) struct TerminalCell<E> {
    slot: OnceLock<Terminal<E>>,
}

impl<E> TerminalCell<E> {
    pub(crate) fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Store `outcome` unless one is already stored; return the stored one
    pub(crate) fn settle(&self, outcome: TerminalOutcome<E>) -> Terminal<E> {
        self.slot
            .get_or_init(|| Terminal(Arc::new(outcome)))
            .clone()
    }

    pub(crate) fn get(&self) -> Option<Terminal<E>> {
        self.slot.get().cloned()
    }
}
