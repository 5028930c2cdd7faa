use portfwd_core::normalize::normalize_line;
use portfwd_core::{translate, Action, HostContext, MutationKind, Rule, Stage};
use pretty_assertions::assert_eq;

fn sample_rules() -> Vec<Rule> {
    [
        "192.168.122.50:443->8443",
        "192.168.122.51:8000:8010->9000:9010",
        "192.168.122.52:53->5353,protocol:udp",
        "guest.lan:22->2222,allow:203.0.113.0/24",
    ]
    .iter()
    .map(|line| normalize_line(line).expect("sample rule should normalize"))
    .collect()
}

fn host() -> HostContext {
    HostContext::new("10.0.0.1")
}

#[test]
fn start_and_stopped_differ_only_in_mutation_kind() {
    for rule in sample_rules() {
        let start = translate(&rule, &host(), Action::Start);
        let stopped = translate(&rule, &host(), Action::Stopped);

        assert!(start.iter().all(|op| op.kind == MutationKind::Add));
        assert!(stopped.iter().all(|op| op.kind == MutationKind::Remove));

        let flipped: Vec<_> = stopped
            .iter()
            .map(|op| op.with_kind(MutationKind::Add))
            .collect();
        assert_eq!(flipped, start);
    }
}

#[test]
fn reconnect_is_stopped_then_start() {
    for rule in sample_rules() {
        let mut expected = translate(&rule, &host(), Action::Stopped);
        expected.extend(translate(&rule, &host(), Action::Start));

        assert_eq!(translate(&rule, &host(), Action::Reconnect), expected);
    }
}

#[test]
fn range_and_single_redirect_targets() {
    let range = normalize_line("192.168.122.51:8000:8010->9000:9010").expect("range rule");
    let ops = translate(&range, &host(), Action::Start);
    assert_eq!(
        ops[1].redirect_target.as_deref(),
        Some("192.168.122.51:8000-8010")
    );

    let single = normalize_line("192.168.122.50:443->8443").expect("single rule");
    let ops = translate(&single, &host(), Action::Start);
    assert_eq!(ops[1].redirect_target.as_deref(), Some("192.168.122.50:443"));
}

#[test]
fn allow_source_only_scopes_forward_accept() {
    let rule = normalize_line("guest.lan:22->2222,allow:203.0.113.0/24").expect("rule");
    for action in [Action::Start, Action::Stopped, Action::Reconnect] {
        for op in translate(&rule, &host(), action) {
            match op.stage {
                Stage::Forward => assert_eq!(op.source.as_deref(), Some("203.0.113.0/24")),
                Stage::Nat => assert_eq!(op.source, None),
            }
        }
    }
}

#[test]
fn end_to_end_start_example() {
    let rule = normalize_line("192.168.122.50:443->8443").expect("rule");
    let ops = translate(&rule, &host(), Action::Start);

    assert_eq!(ops.len(), 2);

    assert_eq!(ops[0].kind, MutationKind::Add);
    assert_eq!(ops[0].stage, Stage::Forward);
    assert_eq!(ops[0].protocol.as_str(), "tcp");
    assert_eq!(ops[0].destination, "192.168.122.50");
    assert_eq!(ops[0].destination_ports, "443");
    assert_eq!(ops[0].interface.as_deref(), Some("virbr0"));

    assert_eq!(ops[1].kind, MutationKind::Add);
    assert_eq!(ops[1].stage, Stage::Nat);
    assert_eq!(ops[1].protocol.as_str(), "tcp");
    assert_eq!(ops[1].destination, "10.0.0.1");
    assert_eq!(ops[1].destination_ports, "8443");
    assert_eq!(ops[1].redirect_target.as_deref(), Some("192.168.122.50:443"));
}
