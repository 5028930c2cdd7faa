use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Transport protocol a forward applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// Lowercase name as the firewall utility expects it.
    pub const fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Parse a protocol keyword, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("tcp") {
            Some(Protocol::Tcp)
        } else if value.eq_ignore_ascii_case("udp") {
            Some(Protocol::Udp)
        } else {
            None
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PortSpec {
    Single(u16),
    Range { start: u16, end: u16 },
}

impl PortSpec {
    /// Number of ports covered.
    pub fn width(self) -> u32 {
        match self {
            PortSpec::Single(_) => 1,
            PortSpec::Range { start, end } => u32::from(end) - u32::from(start) + 1,
        }
    }

    pub fn is_range(self) -> bool {
        matches!(self, PortSpec::Range { .. })
    }

    /// Render for a DNAT redirect target, where ranges use `-`.
    pub fn to_target_syntax(self) -> String {
        match self {
            PortSpec::Single(port) => port.to_string(),
            PortSpec::Range { start, end } => format!("{start}-{end}"),
        }
    }
}

/// Match syntax: `443` or `8000:8010`.
impl Display for PortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Single(port) => write!(f, "{port}"),
            PortSpec::Range { start, end } => write!(f, "{start}:{end}"),
        }
    }
}

/// Canonical, format-independent description of a forward for one guest port
/// (or port range).
///
/// Fields are only reachable through accessors; a `Rule` is built once by the
/// normalizer and read by the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    guest_address: String,
    guest_ports: PortSpec,
    host_ports: PortSpec,
    allow_source: Option<String>,
    protocol: Protocol,
}

impl Rule {
    pub(crate) fn new(
        guest_address: String,
        guest_ports: PortSpec,
        host_ports: PortSpec,
        allow_source: Option<String>,
        protocol: Protocol,
    ) -> Self {
        Self {
            guest_address,
            guest_ports,
            host_ports,
            allow_source,
            protocol,
        }
    }

    pub fn guest_address(&self) -> &str {
        &self.guest_address
    }

    pub fn guest_ports(&self) -> PortSpec {
        self.guest_ports
    }

    pub fn host_ports(&self) -> PortSpec {
        self.host_ports
    }

    /// Source address or network allowed to reach the guest; `None` means any.
    pub fn allow_source(&self) -> Option<&str> {
        self.allow_source.as_deref()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// `guest:ports` in redirect-target syntax.
    pub fn redirect_target(&self) -> String {
        format!(
            "{}:{}",
            self.guest_address,
            self.guest_ports.to_target_syntax()
        )
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{} {}",
            self.guest_address, self.guest_ports, self.host_ports, self.protocol
        )?;
        if let Some(allow) = &self.allow_source {
            write!(f, " allow {allow}")?;
        }
        Ok(())
    }
}
