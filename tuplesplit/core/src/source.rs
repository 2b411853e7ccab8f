//! Tuple Sources
//!
//! The driver only ever needs one capability from its producer: pull the
//! next tuple. [`PullSource`] is that capability. Callers pick the adapter
//! explicitly through a [`TupleSource`] constructor instead of having the
//! splitter guess what kind of producer it was handed:
//!
//! - [`TupleSource::from_sequence`]: a plain synchronous sequence of tuples
//! - [`TupleSource::try_from_sequence`]: a synchronous sequence of `Result`s
//! - [`TupleSource::from_stream`]: a `futures::Stream` of `Result`s
//! - [`TupleSource::from_pull`]: anything already implementing [`PullSource`]
//!
//! Synchronous sequences are forwarded element by element without blocking
//! or suspending.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

/// Producer of fixed-width tuples
///
/// `pull` returns `Some(Ok(tuple))` for the next tuple, `Some(Err(e))` when
/// the producer failed, and `None` once it is exhausted. The driver never
/// calls `pull` again after either of the latter two.
#[async_trait]
pub trait PullSource: Send {
    /// Element type at every tuple position
    type Value: Send;
    /// Error reported by the producer
    type Error: Send;

    /// Pull the next tuple
    async fn pull(&mut self) -> Option<Result<Vec<Self::Value>, Self::Error>>;
}

/// Adapter over a synchronous iterator of `Result<tuple, E>`
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    /// Wrap an iterator
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

#[async_trait]
impl<I, T, V, E> PullSource for IterSource<I>
where
    I: Iterator<Item = Result<T, E>> + Send,
    T: IntoIterator<Item = V>,
    V: Send,
    E: Send,
{
    type Value = V;
    type Error = E;

    async fn pull(&mut self) -> Option<Result<Vec<V>, E>> {
        self.iter
            .next()
            .map(|item| item.map(|tuple| tuple.into_iter().collect()))
    }
}

/// Adapter over a `futures::Stream` of `Result<tuple, E>`
pub struct StreamSource<S> {
    stream: Pin<Box<S>>,
}

impl<S> StreamSource<S> {
    /// Wrap a stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: Box::pin(stream),
        }
    }
}

#[async_trait]
impl<S, T, V, E> PullSource for StreamSource<S>
where
    S: Stream<Item = Result<T, E>> + Send,
    T: IntoIterator<Item = V>,
    V: Send,
    E: Send,
{
    type Value = V;
    type Error = E;

    async fn pull(&mut self) -> Option<Result<Vec<V>, E>> {
        let item = self.stream.next().await?;
        Some(item.map(|tuple| tuple.into_iter().collect()))
    }
}

/// Which constructor produced a [`TupleSource`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Synchronous sequence
    Iter,
    /// Asynchronous stream
    Stream,
    /// Native [`PullSource`] implementation
    Pull,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iter => write!(f, "iter"),
            Self::Stream => write!(f, "stream"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

/// Type-erased tuple producer handed to the splitter
pub struct TupleSource<V, E> {
    kind: SourceKind,
    inner: Box<dyn PullSource<Value = V, Error = E>>,
}

impl<V, E> TupleSource<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Adapt an infallible synchronous sequence of tuples
    pub fn from_sequence<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: IntoIterator<Item = V> + 'static,
    {
        Self {
            kind: SourceKind::Iter,
            inner: Box::new(IterSource::new(iter.into_iter().map(Ok::<T, E>))),
        }
    }

    /// Adapt a synchronous sequence whose items may be errors
    pub fn try_from_sequence<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
        T: IntoIterator<Item = V>,
    {
        Self {
            kind: SourceKind::Iter,
            inner: Box::new(IterSource::new(iter.into_iter())),
        }
    }

    /// Adapt an asynchronous stream of tuples
    pub fn from_stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: IntoIterator<Item = V>,
    {
        Self {
            kind: SourceKind::Stream,
            inner: Box::new(StreamSource::new(stream)),
        }
    }

    /// Use a native pull source as is
    pub fn from_pull<P>(source: P) -> Self
    where
        P: PullSource<Value = V, Error = E> + 'static,
    {
        Self {
            kind: SourceKind::Pull,
            inner: Box::new(source),
        }
    }
}

impl<V, E> TupleSource<V, E> {
    /// Which constructor produced this source
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

impl<V, E> fmt::Debug for TupleSource<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleSource")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<V: Send, E: Send> PullSource for TupleSource<V, E> {
    type Value = V;
    type Error = E;

    async fn pull(&mut self) -> Option<Result<Vec<V>, E>> {
        self.inner.pull().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iter_source_forwards_then_ends() {
        let mut source: TupleSource<u32, String> = TupleSource::from_sequence(vec![[1, 2], [3, 4]]);
        assert_eq!(source.kind(), SourceKind::Iter);

        assert!(matches!(source.pull().await, Some(Ok(ref t)) if t == &[1, 2]));
        assert!(matches!(source.pull().await, Some(Ok(ref t)) if t == &[3, 4]));
        assert!(source.pull().await.is_none());
    }

    #[tokio::test]
    async fn test_iter_source_does_not_suspend() {
        use futures::FutureExt;

        let mut source: TupleSource<u32, String> = TupleSource::from_sequence(vec![vec![7]]);
        let first = source.pull().now_or_never();
        assert!(matches!(first, Some(Some(Ok(_)))));
        assert!(matches!(source.pull().now_or_never(), Some(None)));
    }

    #[tokio::test]
    async fn test_try_from_sequence_surfaces_error() {
        let items: Vec<Result<Vec<u32>, String>> = vec![Ok(vec![1]), Err("boom".to_string())];
        let mut source = TupleSource::try_from_sequence(items);

        assert!(matches!(source.pull().await, Some(Ok(_))));
        assert!(matches!(source.pull().await, Some(Err(ref e)) if e == "boom"));
    }

    #[tokio::test]
    async fn test_stream_source() {
        let stream = futures::stream::iter(vec![Ok::<_, String>(vec!['a', 'b'])]);
        let mut source = TupleSource::from_stream(stream);
        assert_eq!(source.kind(), SourceKind::Stream);

        assert!(matches!(source.pull().await, Some(Ok(ref t)) if t == &['a', 'b']));
        assert!(source.pull().await.is_none());
    }

    struct Countdown(u32);

    #[async_trait]
    impl PullSource for Countdown {
        type Value = u32;
        type Error = String;

        async fn pull(&mut self) -> Option<Result<Vec<u32>, String>> {
            if self.0 == 0 {
                return None;
            }
            self.0 -= 1;
            Some(Ok(vec![self.0, self.0 * 10]))
        }
    }

    #[tokio::test]
    async fn test_from_pull() {
        let mut source = TupleSource::from_pull(Countdown(1));
        assert_eq!(source.kind(), SourceKind::Pull);
        assert_eq!(format!("{source:?}"), "TupleSource { kind: Pull, .. }");

        assert!(matches!(source.pull().await, Some(Ok(ref t)) if t == &[0, 0]));
        assert!(source.pull().await.is_none());
    }
}
