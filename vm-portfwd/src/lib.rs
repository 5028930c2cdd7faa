//! libvirt hook support for per-VM port forwarding.
//!
//! [`portfwd_core`] owns the rule model and translation; this crate supplies
//! the parts that touch the outside world:
//!
//! - [`config`] - the four historical config layouts and format detection
//! - [`backend`] - `iptables` execution and a dry-run recorder
//! - [`report`] - terminal rendering of plans and dispatch summaries

pub mod backend;
pub mod config;
pub mod report;
