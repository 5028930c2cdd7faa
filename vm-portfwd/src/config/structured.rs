use std::collections::BTreeMap;

use portfwd_core::{RawFragment, RuleRecord};
use serde::Deserialize;

use super::{ConfigError, ConfigSource, ParsedConfig};

/// Structured TOML layout.
///
/// ```toml
/// host_ip = "10.0.0.1"
/// bridge = "virbr0"
///
/// [[vm.web]]
/// guest = "192.168.122.50"
/// guest_ports = 443
/// host_ports = 8443
/// allow = "203.0.113.0/24"
///
/// [[vm.web]]
/// guest = "192.168.122.50"
/// guest_ports = "8000:8010"
/// host_ports = "9000:9010"
/// protocol = "udp"
/// ```
///
/// Rule fields are all optional at this stage so that one incomplete rule is
/// reported by the normalizer instead of rejecting the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSource;

#[derive(Debug, Deserialize)]
struct Document {
    host_ip: Option<String>,
    bridge: Option<String>,
    #[serde(default)]
    vm: BTreeMap<String, Vec<RuleTable>>,
}

#[derive(Debug, Deserialize)]
struct RuleTable {
    guest: Option<String>,
    guest_ports: Option<PortValue>,
    host_ports: Option<PortValue>,
    allow: Option<String>,
    protocol: Option<String>,
}

/// Ports may be written as `443` or `"8000:8010"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    fn into_text(self) -> String {
        match self {
            PortValue::Number(n) => n.to_string(),
            PortValue::Text(s) => s,
        }
    }
}

impl From<RuleTable> for RuleRecord {
    fn from(table: RuleTable) -> Self {
        RuleRecord {
            guest: table.guest.unwrap_or_default(),
            guest_ports: table
                .guest_ports
                .map(PortValue::into_text)
                .unwrap_or_default(),
            host_ports: table
                .host_ports
                .map(PortValue::into_text)
                .unwrap_or_default(),
            allow: table.allow,
            protocol: table.protocol,
        }
    }
}

impl ConfigSource for TomlSource {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn parse(&self, raw: &str) -> Result<ParsedConfig, ConfigError> {
        let doc: Document = toml::from_str(raw)?;
        let vms = doc
            .vm
            .into_iter()
            .map(|(name, tables)| {
                let fragments = tables
                    .into_iter()
                    .map(|table| RawFragment::Record(table.into()))
                    .collect();
                (name, fragments)
            })
            .collect();

        Ok(ParsedConfig {
            host_ip: doc.host_ip,
            bridge: doc.bridge,
            vms,
        })
    }
}
