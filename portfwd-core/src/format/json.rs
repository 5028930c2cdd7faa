use crate::translate::Operation;

/// Format operations as a pretty-printed JSON array.
pub fn format_json(ops: &[Operation]) -> String {
    serde_json::to_string_pretty(ops).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::format_json;
    use crate::normalize::normalize_line;
    use crate::translate::{translate, Action, HostContext};

    #[test]
    fn nat_operation_omits_forward_only_fields() {
        let rule = normalize_line("10.0.0.5:22->2222,allow:10.9.0.0/16").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Start);
        let value: serde_json::Value =
            serde_json::from_str(&format_json(&ops)).expect("valid json");

        assert_eq!(value[0]["kind"], "add");
        assert_eq!(value[0]["stage"], "forward");
        assert_eq!(value[0]["source"], "10.9.0.0/16");
        assert_eq!(value[1]["stage"], "nat");
        assert!(value[1].get("source").is_none());
        assert_eq!(value[1]["redirect_target"], "10.0.0.5:22");
    }
}
