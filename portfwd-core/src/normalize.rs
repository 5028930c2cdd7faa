//! Rule normalization.
//!
//! Every configuration format the hook has ever understood ends up here as a
//! [`RawFragment`]. The text forms share one core syntax,
//!
//! ```text
//! GUEST_ADDRESS:GUEST_PORTS->HOST_PORTS
//! ```
//!
//! followed by optional `key:value` modifiers. The INI and key/value-line
//! formats separate modifiers with `,`; the older pipe format uses `|`.
//! Structured documents skip the text syntax and hand over a [`RuleRecord`].
//!
//! Recognized modifiers are `allow:<address-or-cidr>` and
//! `protocol:<tcp|udp>`. Unknown modifier keys are ignored so newer configs
//! still load on older builds.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::Serialize;
use thiserror::Error;

use crate::rule::{PortSpec, Protocol, Rule};

const CORE_SEPARATOR: &str = "->";

/// One unparsed rule as read from a configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RawFragment {
    /// Core syntax with `,`-separated modifiers.
    Line(String),
    /// Core syntax with `|`-separated modifiers.
    Options(String),
    /// Pre-split fields from a structured document.
    Record(RuleRecord),
}

impl RawFragment {
    /// Text shown in diagnostics when this fragment fails to normalize.
    pub fn describe(&self) -> String {
        match self {
            RawFragment::Line(text) | RawFragment::Options(text) => text.clone(),
            RawFragment::Record(record) => format!(
                "{}:{}->{}",
                record.guest, record.guest_ports, record.host_ports
            ),
        }
    }
}

/// Rule fields as they appear in a structured document, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleRecord {
    pub guest: String,
    pub guest_ports: String,
    pub host_ports: String,
    pub allow: Option<String>,
    pub protocol: Option<String>,
}

/// Why a fragment could not become a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("expected exactly one '->' in '{0}'")]
    Separator(String),
    #[error("expected GUEST_ADDRESS:PORTS before '->', got '{0}'")]
    GuestSide(String),
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("invalid port value '{value}': {reason}")]
    Port { value: String, reason: &'static str },
    #[error("guest ports '{guest}' and host ports '{host}' must both be single ports or both be ranges")]
    PortArity { guest: String, host: String },
    #[error("guest range '{guest}' and host range '{host}' cover a different number of ports")]
    RangeWidth { guest: String, host: String },
    #[error("allow source '{0}' is not an IP address or network")]
    AllowSource(String),
    #[error("unsupported protocol '{0}' (expected tcp or udp)")]
    Protocol(String),
}

/// Normalize any fragment kind into a canonical [`Rule`].
pub fn normalize(fragment: &RawFragment) -> Result<Rule, NormalizeError> {
    match fragment {
        RawFragment::Line(text) => normalize_line(text),
        RawFragment::Options(text) => normalize_options(text),
        RawFragment::Record(record) => normalize_record(record),
    }
}

/// Normalize `GUEST:PORTS->HOSTPORTS[,key:value...]`.
pub fn normalize_line(text: &str) -> Result<Rule, NormalizeError> {
    normalize_delimited(text, ',')
}

/// Normalize `GUEST:PORTS->HOSTPORTS[|key:value...]`.
pub fn normalize_options(text: &str) -> Result<Rule, NormalizeError> {
    normalize_delimited(text, '|')
}

/// Validate a structured record.
pub fn normalize_record(record: &RuleRecord) -> Result<Rule, NormalizeError> {
    let guest = record.guest.trim();
    let guest_ports = record.guest_ports.trim();
    let host_ports = record.host_ports.trim();
    let modifiers = Modifiers {
        allow: record.allow.as_deref().map(str::trim).map(str::to_string),
        protocol: record
            .protocol
            .as_deref()
            .map(str::trim)
            .map(str::to_string),
    };
    build_rule(guest, guest_ports, host_ports, modifiers)
}

/// Split the `GUEST:PORTS->HOSTPORTS` core into its three components.
///
/// The guest side is split on its first `:`, so a guest range such as
/// `10.0.0.5:8000:8010` keeps `8000:8010` intact.
pub fn parse_core(core: &str) -> Result<(&str, &str, &str), NormalizeError> {
    let mut sides = core.split(CORE_SEPARATOR);
    let (Some(guest_side), Some(host_ports), None) = (sides.next(), sides.next(), sides.next())
    else {
        return Err(NormalizeError::Separator(core.trim().to_string()));
    };

    let guest_side = guest_side.trim();
    let (guest, guest_ports) = guest_side
        .split_once(':')
        .ok_or_else(|| NormalizeError::GuestSide(guest_side.to_string()))?;

    Ok((guest.trim(), guest_ports.trim(), host_ports.trim()))
}

#[derive(Debug, Default)]
struct Modifiers {
    allow: Option<String>,
    protocol: Option<String>,
}

fn normalize_delimited(text: &str, delimiter: char) -> Result<Rule, NormalizeError> {
    let mut parts = text.split(delimiter);
    let core = parts.next().unwrap_or_default();
    let (guest, guest_ports, host_ports) = parse_core(core)?;
    let modifiers = parse_modifiers(parts);
    build_rule(guest, guest_ports, host_ports, modifiers)
}

fn parse_modifiers<'a>(tokens: impl Iterator<Item = &'a str>) -> Modifiers {
    let mut modifiers = Modifiers::default();
    for token in tokens.map(str::trim).filter(|t| !t.is_empty()) {
        let Some((key, value)) = token.split_once(':') else {
            tracing::debug!(token, "ignoring modifier without key");
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "allow" => modifiers.allow = Some(value),
            "protocol" | "proto" => modifiers.protocol = Some(value),
            other => tracing::debug!(key = other, "ignoring unknown rule modifier"),
        }
    }
    modifiers
}

fn build_rule(
    guest: &str,
    guest_ports: &str,
    host_ports: &str,
    modifiers: Modifiers,
) -> Result<Rule, NormalizeError> {
    if guest.is_empty() {
        return Err(NormalizeError::EmptyField("guest address"));
    }
    if guest.chars().any(char::is_whitespace) {
        return Err(NormalizeError::GuestSide(guest.to_string()));
    }

    let guest_spec = parse_ports(guest_ports, "guest ports")?;
    let host_spec = parse_ports(host_ports, "host ports")?;
    if guest_spec.is_range() != host_spec.is_range() {
        return Err(NormalizeError::PortArity {
            guest: guest_ports.to_string(),
            host: host_ports.to_string(),
        });
    }
    if guest_spec.width() != host_spec.width() {
        return Err(NormalizeError::RangeWidth {
            guest: guest_ports.to_string(),
            host: host_ports.to_string(),
        });
    }

    let allow_source = match modifiers.allow.filter(|a| !a.is_empty()) {
        Some(allow) => Some(validate_allow_source(allow)?),
        None => None,
    };

    let protocol = match modifiers.protocol.filter(|p| !p.is_empty()) {
        Some(proto) => Protocol::parse(&proto).ok_or(NormalizeError::Protocol(proto))?,
        None => Protocol::default(),
    };

    Ok(Rule::new(
        guest.to_string(),
        guest_spec,
        host_spec,
        allow_source,
        protocol,
    ))
}

fn parse_ports(value: &str, field: &'static str) -> Result<PortSpec, NormalizeError> {
    if value.is_empty() {
        return Err(NormalizeError::EmptyField(field));
    }
    match value.split_once(':') {
        None => parse_port(value).map(PortSpec::Single),
        Some((start, end)) => {
            let start = parse_port(start.trim())?;
            let end = parse_port(end.trim())?;
            if start > end {
                return Err(NormalizeError::Port {
                    value: value.to_string(),
                    reason: "range start is greater than range end",
                });
            }
            Ok(PortSpec::Range { start, end })
        }
    }
}

fn parse_port(value: &str) -> Result<u16, NormalizeError> {
    match value.parse::<u16>() {
        Ok(0) => Err(NormalizeError::Port {
            value: value.to_string(),
            reason: "port 0 is not forwardable",
        }),
        Ok(port) => Ok(port),
        Err(_) => Err(NormalizeError::Port {
            value: value.to_string(),
            reason: "expected a number between 1 and 65535",
        }),
    }
}

fn validate_allow_source(allow: String) -> Result<String, NormalizeError> {
    if allow.parse::<IpAddr>().is_ok() || allow.parse::<IpNetwork>().is_ok() {
        Ok(allow)
    } else {
        Err(NormalizeError::AllowSource(allow))
    }
}
