//! Firewall backends: the real `iptables` runner and a dry-run recorder.

use std::process::Command;

use portfwd_core::{BackendError, FirewallBackend, MutationKind, Operation, RecordingBackend};
use tracing::debug;

/// stderr fragments iptables prints when asked to delete a rule it does not
/// have.
const ABSENT_MARKERS: &[&str] = &[
    "Bad rule",
    "does a matching rule exist",
    "No chain/target/match",
    "does not exist",
];

/// Runs one `iptables` process per operation.
#[derive(Debug, Clone)]
pub struct IptablesBackend {
    program: String,
}

impl IptablesBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for IptablesBackend {
    fn default() -> Self {
        Self::new("iptables")
    }
}

impl FirewallBackend for IptablesBackend {
    fn apply(&mut self, op: &Operation) -> Result<(), BackendError> {
        let args = op.iptables_args();
        debug!(program = %self.program, args = %args.join(" "), "running firewall command");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            format!("{} exited with {}", self.program, output.status)
        } else {
            stderr
        };
        Err(classify_failure(op.kind, detail))
    }
}

/// A failed delete whose stderr says the rule was missing is `Absent`; every
/// other failure is `Failed`.
pub fn classify_failure(kind: MutationKind, detail: String) -> BackendError {
    let absent = kind == MutationKind::Remove
        && ABSENT_MARKERS.iter().any(|marker| detail.contains(marker));
    if absent {
        BackendError::Absent { detail }
    } else {
        BackendError::Failed { detail }
    }
}

/// Records operations without touching the firewall.
#[derive(Debug, Default)]
pub struct DryRunBackend {
    recorder: RecordingBackend,
}

impl DryRunBackend {
    pub fn operations(&self) -> &[Operation] {
        &self.recorder.operations
    }
}

impl FirewallBackend for DryRunBackend {
    fn apply(&mut self, op: &Operation) -> Result<(), BackendError> {
        debug!(kind = ?op.kind, stage = ?op.stage, "dry run: not applying");
        self.recorder.apply(op)
    }
}
