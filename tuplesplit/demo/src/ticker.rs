//! Ticking demo source and per-branch consumers

use std::convert::Infallible;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::info;

use tuplesplit_core::{Branch, TupleSource};

/// Demo branches never see a source error; the ticker cannot fail.
pub type DemoBranch = Branch<u64, Infallible>;

/// Source yielding `[n, 2n]` once per `interval`, `rounds` times
///
/// The first tuple arrives one interval after the source is first pulled.
/// Ticks are only consumed when the splitter pulls, so a slow branch delays
/// the ticker instead of making it burst.
pub fn ticking_source(rounds: u64, interval: Duration) -> TupleSource<u64, Infallible> {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let tuples = futures::stream::iter(0..rounds)
        .zip(IntervalStream::new(ticker))
        .map(|(n, _)| {
            info!(n, "Source produced tuple");
            Ok([n, 2 * n])
        });

    TupleSource::from_stream(tuples)
}

/// What one consumer saw before its branch ended
#[derive(Debug)]
pub struct BranchReport {
    /// Branch position
    pub index: usize,
    /// Values received
    pub values: Vec<u64>,
    /// Label of the terminal outcome
    pub outcome: &'static str,
}

/// Read `branch` until it ends, sleeping `delay` after every value
pub async fn consume(mut branch: DemoBranch, delay: Duration) -> BranchReport {
    let index = branch.index();
    let mut values = Vec::new();

    let outcome = loop {
        match branch.next().await {
            Ok(value) => {
                info!(branch = index, value, "Consumer received value");
                values.push(value);
                tokio::time::sleep(delay).await;
            }
            Err(terminal) => {
                info!(branch = index, outcome = %terminal, "Consumer finished");
                break terminal.label();
            }
        }
    };

    BranchReport {
        index,
        values,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuplesplit_core::split;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_yields_doubled_pairs() {
        let branches = split(ticking_source(3, Duration::from_millis(100)))
            .await
            .unwrap()
            .into_branches();

        let tasks: Vec<_> = branches
            .into_iter()
            .map(|b| tokio::spawn(consume(b, Duration::from_millis(10))))
            .collect();

        let mut reports = Vec::new();
        for task in tasks {
            reports.push(task.await.unwrap());
        }

        assert_eq!(reports[0].values, vec![0, 1, 2]);
        assert_eq!(reports[1].values, vec![0, 2, 4]);
        assert!(reports.iter().all(|r| r.outcome == "exhausted"));
    }
}
