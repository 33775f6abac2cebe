//! Failure bundling for loops of risky attempts.
//!
//! A worker that processes many records wraps each attempt in [`Bundle::attempt`].
//! Ordinary failures are absorbed and grouped by signature, so a batch of N identical failures renders as one entry with N occurrences.
//! At the end of the loop [`Bundle::finalize`] writes the rendered bundle to stderr and returns [`BundledError`], which the worker propagates to exit non-zero.
//!
//! ```rust
//! use cronvisor_bundle::{Bundle, ErrorBundler};
//!
//! let mut bundler = ErrorBundler::new();
//! for id in 0..3 {
//!     bundler.attempt(Some(id), || -> anyhow::Result<()> {
//!         anyhow::ensure!(id != 1, "record is malformed");
//!         Ok(())
//!     })?;
//! }
//! assert_eq!(bundler.occurrences(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Control signals ([`ControlSignal`]) are never absorbed.

mod bundler;
pub use bundler::{Bundle, BundlerConfig, ErrorBundler, NullBundler};

mod error;
pub use error::{BundledError, ControlSignal, is_control};

mod sink;
pub use sink::ReportSink;

/// Default number of context values retained per signature.
pub const DEFAULT_DATA_LIMIT: usize = 100;

/// Default number of occurrences per signature forwarded to a [`ReportSink`].
pub const DEFAULT_FORWARD_LIMIT: usize = 10;
