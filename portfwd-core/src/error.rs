use thiserror::Error;

use crate::dispatch::BackendError;
use crate::normalize::NormalizeError;

/// Everything that can go wrong between reading a forwarding config and
/// applying its firewall mutations.
///
/// Only [`ForwardError::ConfigInvalid`] and [`ForwardError::VmNotFound`] end a
/// dispatch; the remaining variants are reported per rule or per operation.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Host address or configuration source unusable.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Requested VM has no entry in the configuration.
    #[error("VM '{0}' not found in configuration")]
    VmNotFound(String),
    /// A single rule fragment could not be turned into a [`crate::Rule`].
    #[error("malformed rule: {0}")]
    MalformedRule(#[from] NormalizeError),
    /// Action keyword is not `start`, `stopped` or `reconnect`.
    #[error("unknown action '{0}' (expected start, stopped or reconnect)")]
    UnknownAction(String),
    /// One firewall mutation failed.
    #[error("firewall backend failure: {0}")]
    BackendFailure(#[from] BackendError),
}
