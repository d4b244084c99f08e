#![forbid(unsafe_code)]

//! Per-signal configuration.

use std::borrow::Cow;

/// Tuning knobs for a [`Signal`](crate::Signal).
///
/// The defaults reproduce the bare contract: no label, unbounded nesting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalConfig {
    /// Name attached to tracing spans, `Debug` output and errors.
    /// Default: `None`.
    pub label: Option<Cow<'static, str>>,

    /// Maximum number of dispatches that may be active on one signal at the
    /// same time (nested `emit` calls, chain cycles). An `emit` beyond the
    /// limit is refused with [`SignalError::NestingLimit`](crate::SignalError).
    /// Default: `None` (unbounded).
    pub max_nesting: Option<usize>,
}

impl SignalConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_max_nesting(mut self, limit: usize) -> Self {
        self.max_nesting = Some(limit);
        self
    }

    pub(crate) fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed>")
    }
}
