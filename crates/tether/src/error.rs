#![forbid(unsafe_code)]

//! Errors reported by signal dispatch.

use std::borrow::Cow;

/// Errors from [`Signal::try_emit`](crate::Signal::try_emit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The signal already had `limit` dispatches in flight.
    NestingLimit {
        label: Option<Cow<'static, str>>,
        limit: usize,
    },
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NestingLimit { label, limit } => {
                let label = label.as_deref().unwrap_or("<unnamed>");
                write!(f, "signal '{label}' refused emit: nesting limit {limit} reached")
            }
        }
    }
}

impl std::error::Error for SignalError {}
