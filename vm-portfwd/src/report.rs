use colored::Colorize;
use portfwd_core::{format_commands, format_json, format_summary, format_text, DispatchReport, Operation};

/// How a dry-run plan is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStyle {
    Text,
    Commands,
    Json,
}

/// Render the operation plan for terminal output.
pub fn render_plan(ops: &[Operation], style: PlanStyle, program: &str) -> String {
    match style {
        PlanStyle::Json => format_json(ops),
        PlanStyle::Commands => format_commands(program, ops),
        PlanStyle::Text => format_text(ops)
            .lines()
            .map(|line| {
                if line.starts_with('+') {
                    line.green().to_string()
                } else if line.starts_with('-') {
                    line.red().to_string()
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render dispatch counts, highlighted when something went wrong.
pub fn render_summary(report: &DispatchReport) -> String {
    let line = format_summary(report);
    if report.is_clean() {
        line.cyan().to_string()
    } else {
        line.yellow().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{render_plan, render_summary, PlanStyle};
    use portfwd_core::normalize::normalize_line;
    use portfwd_core::{dispatch, translate, Action, ForwardingConfig, HostContext, RawFragment, RecordingBackend};

    #[test]
    fn commands_style_lists_full_invocations() {
        colored::control::set_override(false);
        let rule = normalize_line("10.0.0.5:22->2222").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Start);

        let plan = render_plan(&ops, PlanStyle::Commands, "iptables");
        assert_eq!(
            plan.lines().next(),
            Some("iptables -I FORWARD -o virbr0 -p tcp -d 10.0.0.5 --dport 22 -j ACCEPT")
        );

        let text = render_plan(&ops, PlanStyle::Text, "iptables");
        assert!(text.starts_with("+ forward tcp"));
    }

    #[test]
    fn summary_mentions_counts() {
        colored::control::set_override(false);
        let mut config = ForwardingConfig::new(HostContext::new("10.0.0.1"));
        config.push_fragment("web", RawFragment::Line("10.0.0.5:22->2222".to_string()));
        let report =
            dispatch(&config, "web", "start", &mut RecordingBackend::default()).expect("dispatch");

        let summary = render_summary(&report);
        assert!(summary.contains("vm=web action=start rules_applied=1"));
        assert!(summary.contains("ops_applied=2"));
    }
}
