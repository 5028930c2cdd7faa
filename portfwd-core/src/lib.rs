//! Canonical VM port-forwarding rules and their translation into firewall
//! mutations.
//!
//! The crate is the pure half of a libvirt hook: it knows nothing about files
//! or processes.
//!
//! - [`rule`] - the canonical [`Rule`] value and its port/protocol types
//! - [`normalize`] - turns raw config fragments of any historical format into
//!   rules
//! - [`translate`] - maps a rule and lifecycle [`Action`] to an ordered list
//!   of firewall [`Operation`]s
//! - [`dispatch`] - resolves a VM, normalizes its rules and drives a
//!   [`FirewallBackend`]
//! - [`format`] - text, command-line and JSON renderings of an operation plan
//!
//! # Example
//!
//! ```
//! use portfwd_core::{dispatch, ForwardingConfig, HostContext, RawFragment, RecordingBackend};
//!
//! let mut config = ForwardingConfig::new(HostContext::new("10.0.0.1"));
//! config.push_fragment("web", RawFragment::Line("192.168.122.50:443->8443".into()));
//!
//! let mut backend = RecordingBackend::default();
//! let report = dispatch(&config, "web", "start", &mut backend).unwrap();
//! assert_eq!(report.operations_applied, 2);
//! ```

pub mod dispatch;
pub mod error;
pub mod format;
pub mod normalize;
pub mod rule;
pub mod translate;

pub use dispatch::{
    dispatch, BackendError, DispatchReport, FirewallBackend, ForwardingConfig, RecordingBackend,
    VmConfig,
};
pub use error::ForwardError;
pub use format::{format_commands, format_json, format_summary, format_text};
pub use normalize::{normalize, NormalizeError, RawFragment, RuleRecord};
pub use rule::{PortSpec, Protocol, Rule};
pub use translate::{translate, Action, HostContext, MutationKind, Operation, Stage, DEFAULT_BRIDGE};
