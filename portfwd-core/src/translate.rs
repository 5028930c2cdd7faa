//! Forwarding translation.
//!
//! A [`Rule`] becomes two firewall operations, always in this order:
//!
//! 1. a forward-accept on the guest bridge, letting traffic reach
//!    `guest:ports` (optionally only from the rule's allowed source);
//! 2. a destination NAT in PREROUTING, rewriting `host:ports` to the guest.
//!
//! Removal uses the same order as addition, so the operation lists for
//! `start` and `stopped` differ only in their [`MutationKind`].

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use crate::error::ForwardError;
use crate::rule::{Protocol, Rule};

/// Bridge interface libvirt creates for its default NAT network.
pub const DEFAULT_BRIDGE: &str = "virbr0";

/// Lifecycle event a hook invocation is reacting to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stopped,
    Reconnect,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stopped => "stopped",
            Action::Reconnect => "reconnect",
        }
    }
}

impl FromStr for Action {
    type Err = ForwardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stopped" => Ok(Action::Stopped),
            "reconnect" => Ok(Action::Reconnect),
            other => Err(ForwardError::UnknownAction(other.to_string())),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation inserts or deletes its firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Add,
    Remove,
}

/// Table/chain an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// `filter` table, `FORWARD` chain.
    Forward,
    /// `nat` table, `PREROUTING` chain.
    Nat,
}

impl Stage {
    pub const fn chain(self) -> &'static str {
        match self {
            Stage::Forward => "FORWARD",
            Stage::Nat => "PREROUTING",
        }
    }
}

/// Host-side values shared by every rule of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostContext {
    /// Externally reachable host address DNAT rules match on.
    pub host_address: String,
    /// Bridge interface guests are attached to.
    pub bridge: String,
}

impl HostContext {
    pub fn new(host_address: impl Into<String>) -> Self {
        Self {
            host_address: host_address.into(),
            bridge: DEFAULT_BRIDGE.to_string(),
        }
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge = bridge.into();
        self
    }
}

/// One firewall mutation, independent of the utility that applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub kind: MutationKind,
    pub stage: Stage,
    /// Outgoing interface; forward stage only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub protocol: Protocol,
    pub destination: String,
    /// Match syntax (`8000:8010`).
    pub destination_ports: String,
    /// Source restriction; forward stage only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// `address:ports` in target syntax (`8000-8010`); NAT stage only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
}

impl Operation {
    fn forward_accept(rule: &Rule, host: &HostContext, kind: MutationKind) -> Self {
        Self {
            kind,
            stage: Stage::Forward,
            interface: Some(host.bridge.clone()),
            protocol: rule.protocol(),
            destination: rule.guest_address().to_string(),
            destination_ports: rule.guest_ports().to_string(),
            source: rule.allow_source().map(str::to_string),
            redirect_target: None,
        }
    }

    fn destination_nat(rule: &Rule, host: &HostContext, kind: MutationKind) -> Self {
        Self {
            kind,
            stage: Stage::Nat,
            interface: None,
            protocol: rule.protocol(),
            destination: host.host_address.clone(),
            destination_ports: rule.host_ports().to_string(),
            source: None,
            redirect_target: Some(rule.redirect_target()),
        }
    }

    /// Same operation with a different mutation kind.
    pub fn with_kind(&self, kind: MutationKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Argument vector for the `iptables` utility.
    ///
    /// Additions insert at the head of the chain (`-I`), removals delete the
    /// matching rule (`-D`).
    pub fn iptables_args(&self) -> Vec<String> {
        let verb = match self.kind {
            MutationKind::Add => "-I",
            MutationKind::Remove => "-D",
        };

        let mut args: Vec<String> = Vec::with_capacity(16);
        if self.stage == Stage::Nat {
            args.extend(["-t".to_string(), "nat".to_string()]);
        }
        args.extend([verb.to_string(), self.stage.chain().to_string()]);
        if let Some(interface) = &self.interface {
            args.extend(["-o".to_string(), interface.clone()]);
        }
        args.extend([
            "-p".to_string(),
            self.protocol.as_str().to_string(),
            "-d".to_string(),
            self.destination.clone(),
            "--dport".to_string(),
            self.destination_ports.clone(),
        ]);
        match &self.redirect_target {
            Some(target) => args.extend([
                "-j".to_string(),
                "DNAT".to_string(),
                "--to-destination".to_string(),
                target.clone(),
            ]),
            None => args.extend(["-j".to_string(), "ACCEPT".to_string()]),
        }
        if let Some(source) = &self.source {
            args.extend(["-s".to_string(), source.clone()]);
        }
        args
    }
}

/// Build the ordered operation list for one rule and action.
pub fn translate(rule: &Rule, host: &HostContext, action: Action) -> Vec<Operation> {
    match action {
        Action::Start => rule_operations(rule, host, MutationKind::Add),
        Action::Stopped => rule_operations(rule, host, MutationKind::Remove),
        Action::Reconnect => {
            let mut ops = rule_operations(rule, host, MutationKind::Remove);
            let additions: Vec<Operation> = ops
                .iter()
                .map(|op| op.with_kind(MutationKind::Add))
                .collect();
            ops.extend(additions);
            ops
        }
    }
}

fn rule_operations(rule: &Rule, host: &HostContext, kind: MutationKind) -> Vec<Operation> {
    vec![
        Operation::forward_accept(rule, host, kind),
        Operation::destination_nat(rule, host, kind),
    ]
}

#[cfg(test)]
mod tests {
    use super::{translate, Action, HostContext, MutationKind, Stage};
    use crate::error::ForwardError;
    use crate::normalize::normalize_line;

    #[test]
    fn action_keywords_parse() {
        assert_eq!("start".parse::<Action>().ok(), Some(Action::Start));
        assert_eq!("stopped".parse::<Action>().ok(), Some(Action::Stopped));
        assert_eq!("reconnect".parse::<Action>().ok(), Some(Action::Reconnect));
        assert!(matches!(
            "prepare".parse::<Action>(),
            Err(ForwardError::UnknownAction(a)) if a == "prepare"
        ));
        assert!("Start".parse::<Action>().is_err());
    }

    #[test]
    fn start_emits_accept_then_dnat() {
        let rule = normalize_line("192.168.122.50:443->8443").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Start);

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].stage, Stage::Forward);
        assert_eq!(ops[1].stage, Stage::Nat);
        assert!(ops.iter().all(|op| op.kind == MutationKind::Add));
    }

    #[test]
    fn forward_args_match_hook_command_shape() {
        let rule = normalize_line("192.168.122.50:443->8443,allow:203.0.113.9").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Start);

        assert_eq!(
            ops[0].iptables_args().join(" "),
            "-I FORWARD -o virbr0 -p tcp -d 192.168.122.50 --dport 443 -j ACCEPT -s 203.0.113.9"
        );
        assert_eq!(
            ops[1].iptables_args().join(" "),
            "-t nat -I PREROUTING -p tcp -d 10.0.0.1 --dport 8443 -j DNAT --to-destination 192.168.122.50:443"
        );
    }

    #[test]
    fn remove_args_use_delete_verb() {
        let rule = normalize_line("10.0.0.5:53->5353,protocol:udp").expect("rule");
        let host = HostContext::new("198.51.100.1").with_bridge("br-lab");
        let ops = translate(&rule, &host, Action::Stopped);

        assert_eq!(
            ops[0].iptables_args().join(" "),
            "-D FORWARD -o br-lab -p udp -d 10.0.0.5 --dport 53 -j ACCEPT"
        );
        assert_eq!(
            ops[1].iptables_args().join(" "),
            "-t nat -D PREROUTING -p udp -d 198.51.100.1 --dport 5353 -j DNAT --to-destination 10.0.0.5:53"
        );
    }

    #[test]
    fn range_rule_rewrites_redirect_target_only() {
        let rule = normalize_line("10.0.0.5:8000:8010->9000:9010").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Start);

        assert_eq!(ops[0].destination_ports, "8000:8010");
        assert_eq!(ops[1].destination_ports, "9000:9010");
        assert_eq!(ops[1].redirect_target.as_deref(), Some("10.0.0.5:8000-8010"));
    }

    #[test]
    fn reconnect_readds_exactly_what_it_removed() {
        let rule = normalize_line("10.0.0.5:22->2222,allow:10.1.0.0/16").expect("rule");
        let ops = translate(&rule, &HostContext::new("10.0.0.1"), Action::Reconnect);

        assert_eq!(ops.len(), 4);
        assert_eq!(ops[2], ops[0].with_kind(MutationKind::Add));
        assert_eq!(ops[3], ops[1].with_kind(MutationKind::Add));
        assert_eq!(ops[0].with_kind(MutationKind::Remove), ops[0]);
    }
}
