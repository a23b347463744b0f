//! Background Jobs
//!
//! - `warmer`: one-shot pass at startup that schedules refreshes for stale
//!   cached keys
//!
//! # Usage
//!
//! ```ignore
//! use ghdash_api::jobs::run_warmup;
//!
//! let swr = Arc::clone(&swr);
//! tokio::spawn(async move {
//!     let report = run_warmup(&swr).await;
//!     tracing::info!(?report, "Warmup finished");
//! });
//! ```

pub mod warmer;

pub use warmer::{run_warmup, WarmupReport};
