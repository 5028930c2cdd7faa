//! Lifecycle dispatch: resolve a VM and action, then push every rule's
//! operations through a [`FirewallBackend`].
//!
//! Failures are isolated. A fragment that does not normalize is skipped and
//! the next one is processed; an operation the backend rejects is counted and
//! the next operation is applied. Only an unusable host context, an unknown
//! VM or an unknown action stop a dispatch, and they do so before any
//! operation is emitted.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ForwardError;
use crate::normalize::{normalize, RawFragment};
use crate::translate::{translate, Action, HostContext, MutationKind, Operation};

/// VM name to its rule fragments, in configuration order.
pub type VmConfig = BTreeMap<String, Vec<RawFragment>>;

/// Everything a configuration source produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardingConfig {
    pub host: HostContext,
    pub vms: VmConfig,
}

impl ForwardingConfig {
    pub fn new(host: HostContext) -> Self {
        Self {
            host,
            vms: VmConfig::new(),
        }
    }

    /// Append a fragment to a VM's rule list, creating the entry if needed.
    pub fn push_fragment(&mut self, vm: impl Into<String>, fragment: RawFragment) {
        self.vms.entry(vm.into()).or_default().push(fragment);
    }
}

/// Failure reported by a backend for a single operation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The rule to delete was not present.
    #[error("rule not present: {detail}")]
    Absent { detail: String },
    /// The utility ran and rejected the operation.
    #[error("{detail}")]
    Failed { detail: String },
    /// The utility could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// Applies firewall operations one at a time.
pub trait FirewallBackend {
    fn apply(&mut self, op: &Operation) -> Result<(), BackendError>;
}

/// Backend that only remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub operations: Vec<Operation>,
}

impl FirewallBackend for RecordingBackend {
    fn apply(&mut self, op: &Operation) -> Result<(), BackendError> {
        self.operations.push(op.clone());
        Ok(())
    }
}

/// Outcome counts for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub vm: String,
    pub action: Action,
    pub rules_applied: usize,
    pub rules_skipped: usize,
    pub operations_applied: usize,
    /// Removals of rules that were not installed.
    pub operations_absent: usize,
    pub operations_failed: usize,
}

impl DispatchReport {
    fn new(vm: &str, action: Action) -> Self {
        Self {
            vm: vm.to_string(),
            action,
            rules_applied: 0,
            rules_skipped: 0,
            operations_applied: 0,
            operations_absent: 0,
            operations_failed: 0,
        }
    }

    /// True when every rule normalized and every operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.rules_skipped == 0 && self.operations_failed == 0
    }
}

/// Apply the forwards configured for `vm` according to `action`.
pub fn dispatch(
    config: &ForwardingConfig,
    vm: &str,
    action: &str,
    backend: &mut dyn FirewallBackend,
) -> Result<DispatchReport, ForwardError> {
    if config.host.host_address.trim().is_empty() {
        return Err(ForwardError::ConfigInvalid(
            "host address is empty".to_string(),
        ));
    }
    let fragments = config
        .vms
        .get(vm)
        .ok_or_else(|| ForwardError::VmNotFound(vm.to_string()))?;
    let action: Action = action.parse()?;

    info!(vm, %action, rules = fragments.len(), "dispatching port forwards");
    let mut report = DispatchReport::new(vm, action);

    for (idx, fragment) in fragments.iter().enumerate() {
        let rule = match normalize(fragment) {
            Ok(rule) => rule,
            Err(err) => {
                warn!(
                    vm,
                    rule = idx + 1,
                    fragment = %fragment.describe(),
                    error = %err,
                    "skipping invalid rule"
                );
                report.rules_skipped += 1;
                continue;
            }
        };

        debug!(vm, rule = %rule, "translating rule");
        for op in translate(&rule, &config.host, action) {
            apply_one(backend, &op, &mut report);
        }
        report.rules_applied += 1;
    }

    info!(
        vm,
        %action,
        applied = report.operations_applied,
        absent = report.operations_absent,
        failed = report.operations_failed,
        skipped_rules = report.rules_skipped,
        "dispatch finished"
    );
    Ok(report)
}

fn apply_one(backend: &mut dyn FirewallBackend, op: &Operation, report: &mut DispatchReport) {
    match backend.apply(op) {
        Ok(()) => report.operations_applied += 1,
        Err(BackendError::Absent { detail }) if op.kind == MutationKind::Remove => {
            debug!(stage = ?op.stage, destination = %op.destination, %detail, "rule already absent");
            report.operations_absent += 1;
        }
        Err(err) => {
            let err = ForwardError::from(err);
            warn!(
                stage = ?op.stage,
                kind = ?op.kind,
                destination = %op.destination,
                ports = %op.destination_ports,
                error = %err,
                "firewall operation failed"
            );
            report.operations_failed += 1;
        }
    }
}
