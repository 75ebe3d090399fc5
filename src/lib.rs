//! A generic request-coalescing batcher.
//!
//! Producers `submit` individual items from many concurrent tasks; the
//! engine groups them into bounded batches by size and queue-time deadline,
//! hands each batch to a user-supplied [`BatchProcessor`], and returns each
//! producer its own item's result once the batch it landed in completes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batcher::{Batcher, BatcherBuilder, BatchOutcome, BatchProcessor};
//! use std::convert::Infallible;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let processor = BatchProcessor::async_fn(|items: Vec<i32>| async move {
//!         Ok::<_, Infallible>(BatchOutcome::Results(
//!             items.into_iter().map(|x| Ok(x * 2)).collect(),
//!         ))
//!     });
//!
//!     let config = BatcherBuilder::new()
//!         .max_batch_size(10)
//!         .build::<Infallible>()?;
//!     let batcher = Batcher::from_config(config, processor)?;
//!
//!     let result = batcher.submit(21).await?;
//!     assert_eq!(result, 42);
//!
//!     batcher.stop(false, None).await?;
//!     Ok(())
//! }
//! ```

mod collector;
mod config;
mod dispatcher;
mod engine;
mod error;
mod handle;
mod processor;
mod queue;
mod worker;

pub use config::{BatcherBuilder, BatcherConfig};
pub use engine::Batcher;
pub use error::BatcherError;
pub use processor::{BatchOutcome, BatchProcessor};
