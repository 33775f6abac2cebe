use std::fmt;

/// External error-tracking service receiving absorbed failures.
///
/// Calls are fire-and-forget: implementations swallow their own transport failures.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str {
        "sink"
    }

    /// Report one absorbed failure together with the attempt's context, if any.
    fn capture(&self, error: &anyhow::Error, context: Option<&dyn fmt::Debug>);
}
