use thiserror::Error;

/// Terminal marker: absorbed failures were already rendered and reported.
///
/// Carries no payload. Whoever receives it must not render the bundle again.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("bundled errors were reported")]
pub struct BundledError;

/// Cancellation and control conditions that bundling never intercepts.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    #[error("interrupted")]
    Interrupt,
    #[error("debugger quit")]
    DebuggerQuit,
}

/// Returns `true` if `err` or any error in its cause chain is a [`ControlSignal`].
pub fn is_control(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ControlSignal>())
}
