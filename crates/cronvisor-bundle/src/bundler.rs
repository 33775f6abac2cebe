use std::{
    collections::HashMap,
    fmt::{self, Write as _},
    io::{self, Write},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    DEFAULT_DATA_LIMIT, DEFAULT_FORWARD_LIMIT,
    error::{BundledError, is_control},
    sink::ReportSink,
};

/// Common interface of the bundling and the pass-through variants.
///
/// Call sites use this trait so bundling can be switched off without touching them.
pub trait Bundle<C> {
    /// Run one attempt with `context` as its current context value.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the failure was absorbed.
    /// Control signals are handed back as `Err`.
    fn attempt<T, F>(&mut self, context: Option<C>, f: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce() -> anyhow::Result<T>;

    /// Render and clear absorbed failures, returning [`BundledError`] if there were any.
    fn finalize(&mut self) -> Result<(), BundledError>;
}

/// Rendering and retention knobs of an [`ErrorBundler`].
#[derive(Debug, Clone)]
pub struct BundlerConfig {
    /// Header printed above the rendered bundle.
    pub descriptor: Option<String>,
    /// Context values retained (and rendered) per signature.
    pub data_limit: usize,
    /// Occurrences per signature forwarded to the sink.
    pub forward_limit: usize,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            descriptor: None,
            data_limit: DEFAULT_DATA_LIMIT,
            forward_limit: DEFAULT_FORWARD_LIMIT,
        }
    }
}

struct Entry<C> {
    /// Debug rendering of the first occurrence.
    detail: String,
    occurrences: usize,
    contexts: Vec<C>,
}

/// Groups absorbed failures by signature.
///
/// The signature is the failure's message followed by its cause chain.
/// Captured backtraces are left out of it, so the same failure raised from different call sites lands in one group.
pub struct ErrorBundler<C = String> {
    cfg: BundlerConfig,
    entries: Vec<Entry<C>>,
    index: HashMap<String, usize>,
    sink: Option<Arc<dyn ReportSink>>,
}

impl<C: fmt::Debug> ErrorBundler<C> {
    pub fn new() -> Self {
        Self::with_config(BundlerConfig::default())
    }

    pub fn with_config(cfg: BundlerConfig) -> Self {
        Self {
            cfg,
            entries: Vec::new(),
            index: HashMap::new(),
            sink: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.cfg.descriptor = Some(descriptor.into());
        self
    }

    /// Forward absorbed failures to `sink`, capped per signature by `forward_limit`.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[inline]
    pub fn config(&self) -> &BundlerConfig {
        &self.cfg
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct signatures.
    #[inline]
    pub fn signatures(&self) -> usize {
        self.entries.len()
    }

    /// Total number of absorbed failures.
    pub fn occurrences(&self) -> usize {
        self.entries.iter().map(|e| e.occurrences).sum()
    }

    /// Retained context values for the `n`-th signature in first-seen order.
    pub fn contexts(&self, n: usize) -> Option<&[C]> {
        self.entries.get(n).map(|e| e.contexts.as_slice())
    }

    /// Absorb `error` under its signature.
    ///
    /// Control signals are not absorbed and come back as `Err`.
    pub fn absorb(&mut self, context: Option<C>, error: anyhow::Error) -> anyhow::Result<()> {
        if is_control(&error) {
            trace!(target: "cronvisor.bundle", "control signal passes through");
            return Err(error);
        }

        let key = signature(&error);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.entries.push(Entry {
                    detail: format!("{error:?}"),
                    occurrences: 0,
                    contexts: Vec::new(),
                });
                let slot = self.entries.len() - 1;
                self.index.insert(key, slot);
                slot
            }
        };

        let entry = &mut self.entries[slot];
        entry.occurrences += 1;
        let occurrences = entry.occurrences;

        if let Some(sink) = &self.sink
            && occurrences <= self.cfg.forward_limit
        {
            let ctx = context.as_ref().map(|c| c as &dyn fmt::Debug);
            sink.capture(&error, ctx);
            trace!(target: "cronvisor.bundle", sink = sink.name(), "failure forwarded");
        }

        if let Some(value) = context
            && entry.contexts.len() < self.cfg.data_limit
        {
            entry.contexts.push(value);
        }

        debug!(
            target: "cronvisor.bundle",
            occurrences,
            signatures = self.entries.len(),
            "failure absorbed"
        );
        Ok(())
    }

    /// Render the bundle as text. Empty bundles render as an empty string.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.entries.is_empty() {
            return out;
        }

        if let Some(descriptor) = &self.cfg.descriptor {
            let _ = writeln!(out, "{descriptor}");
        }
        for entry in &self.entries {
            let _ = writeln!(out, "===============");
            let _ = writeln!(out, "observed {} time(s):", entry.occurrences);
            let _ = writeln!(out, "{}", entry.detail.trim_end());
            if !entry.contexts.is_empty() {
                let shown = entry.contexts.len().min(self.cfg.data_limit);
                let _ = writeln!(out, "context: {:?}", &entry.contexts[..shown]);
            }
        }
        out
    }

    /// Like [`Bundle::finalize`], writing to `out` instead of stderr.
    pub fn finalize_to<W: Write>(&mut self, out: &mut W) -> Result<(), BundledError> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let text = self.render();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            warn!(target: "cronvisor.bundle", error = %e, "failed to write bundled errors");
        }

        debug!(
            target: "cronvisor.bundle",
            signatures = self.entries.len(),
            occurrences = self.occurrences(),
            "bundle finalized"
        );
        self.entries.clear();
        self.index.clear();
        Err(BundledError)
    }
}

impl<C: fmt::Debug> Default for ErrorBundler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: fmt::Debug> Bundle<C> for ErrorBundler<C> {
    fn attempt<T, F>(&mut self, context: Option<C>, f: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        match f() {
            Ok(value) => Ok(Some(value)),
            Err(error) => self.absorb(context, error).map(|_| None),
        }
    }

    fn finalize(&mut self) -> Result<(), BundledError> {
        self.finalize_to(&mut io::stderr().lock())
    }
}

fn signature(error: &anyhow::Error) -> String {
    let mut key = String::new();
    for (depth, cause) in error.chain().enumerate() {
        if depth > 0 {
            key.push_str("\ncaused by: ");
        }
        let _ = write!(key, "{cause}");
    }
    key
}

/// Pass-through variant: never intercepts, never reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBundler;

impl<C> Bundle<C> for NullBundler {
    fn attempt<T, F>(&mut self, _context: Option<C>, f: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        f().map(Some)
    }

    fn finalize(&mut self) -> Result<(), BundledError> {
        Ok(())
    }
}
