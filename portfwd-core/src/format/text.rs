use crate::dispatch::DispatchReport;
use crate::translate::{MutationKind, Operation, Stage};

/// Format operations as one human-readable line each.
pub fn format_text(ops: &[Operation]) -> String {
    let mut lines = Vec::with_capacity(ops.len());
    for op in ops {
        let sign = match op.kind {
            MutationKind::Add => '+',
            MutationKind::Remove => '-',
        };
        let mut line = match op.stage {
            Stage::Forward => format!(
                "{sign} forward {} -> {}:{} via {}",
                op.protocol,
                op.destination,
                op.destination_ports,
                op.interface.as_deref().unwrap_or("any")
            ),
            Stage::Nat => format!(
                "{sign} dnat {} {}:{} -> {}",
                op.protocol,
                op.destination,
                op.destination_ports,
                op.redirect_target.as_deref().unwrap_or_default()
            ),
        };
        if let Some(source) = &op.source {
            line.push_str(&format!(" from {source}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Format operations as the command lines `program` would be run with.
pub fn format_commands(program: &str, ops: &[Operation]) -> String {
    ops.iter()
        .map(|op| format!("{program} {}", op.iptables_args().join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format dispatch counts on a single line.
pub fn format_summary(report: &DispatchReport) -> String {
    format!(
        "vm={} action={} rules_applied={} rules_skipped={} ops_applied={} ops_absent={} ops_failed={}",
        report.vm,
        report.action,
        report.rules_applied,
        report.rules_skipped,
        report.operations_applied,
        report.operations_absent,
        report.operations_failed
    )
}
