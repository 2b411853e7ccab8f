//! Tuplesplit Core - Lockstep Splitting of Async Tuple Sources
//!
//! This crate turns one asynchronous producer of fixed-width tuples into `W`
//! independently consumable branches, one per tuple position. Every branch
//! observes the same rounds in the same order, and the producer is never
//! pulled faster than the slowest branch asks for values.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         TupleSource                              │
//! │   from_sequence │ try_from_sequence │ from_stream │ from_pull    │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ pull()
//! ┌───────────────────────────────┴──────────────────────────────────┐
//! │                           Driver task                            │
//! │   AwaitingRound ──barrier──► pull ──► Delivering ──► (repeat)    │
//! │          │                                                       │
//! │          └── exhausted / error / width mismatch ──► Stopped      │
//! └──────┬──────────────────────┬──────────────────────────┬─────────┘
//!        │ request / delivery   │                          │
//!  ┌─────┴─────┐          ┌─────┴─────┐              ┌─────┴─────┐
//!  │ Branch 0  │          │ Branch 1  │     ...      │ Branch W-1│
//!  └─────┬─────┘          └─────┬─────┘              └─────┬─────┘
//!        │                      │                          │
//!    consumer               consumer                   consumer
//! ```
//!
//! # Key Types
//!
//! - [`split`]: pull the first tuple, create the branches, spawn the driver
//! - [`TupleSource`]: explicitly adapted producer
//! - [`Branch`]: one tuple position as its own sequence
//! - [`Terminal`]: the shared, sticky outcome every branch converges on
//! - [`SplitterHandle`]: observe or abort the driver
//!
//! # Quick Start
//!
//! ```ignore
//! use futures::StreamExt;
//! use tuplesplit_core::{split, TupleSource};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = TupleSource::<u32, String>::from_sequence(vec![[1, 2], [3, 4]]);
//!     let mut branches = split(source).await.unwrap().into_branches();
//!     let right = branches.pop().unwrap();
//!     let left = branches.pop().unwrap();
//!
//!     let evens = tokio::spawn(async move { right.into_stream().collect::<Vec<_>>().await });
//!     let odds = left.into_stream().collect::<Vec<_>>().await;
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod branch;
pub mod config;
pub mod driver;
pub mod outcome;
pub mod source;
pub mod splitter;

// Re-export main types
pub use branch::Branch;
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DemoConfig, SplitterConfig, TupleSplitConfig,
};
pub use driver::DriverState;
pub use outcome::{SplitError, Terminal, TerminalOutcome};
pub use source::{IterSource, PullSource, SourceKind, StreamSource, TupleSource};
pub use splitter::{split, split_with_config, Splitter, SplitterHandle};
