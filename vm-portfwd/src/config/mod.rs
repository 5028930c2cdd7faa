//! Forwarding configuration sources.
//!
//! The hook has read its rules from four file layouts over time. Each one has
//! a [`ConfigSource`] implementation; all of them produce the same
//! [`ForwardingConfig`] so the core never sees the difference.
//!
//! | Format | Example |
//! |---|---|
//! | `ini` | `[DEFAULT]` / `host_ip = 10.0.0.1` / `[web]` / `https = 192.168.122.50:443->8443,allow:10.1.0.0/16` |
//! | `lines` | `host_ip=10.0.0.1` / `web=192.168.122.50:443->8443` |
//! | `pipe` | `host_ip\|10.0.0.1` / `web\|192.168.122.50:443->8443\|protocol:udp` |
//! | `toml` | `host_ip = "10.0.0.1"` / `[[vm.web]]` / `guest = "192.168.122.50"` ... |
//!
//! When no format is given, [`detect_format`] picks one from the content.

use std::fs;
use std::path::Path;

use portfwd_core::{ForwardingConfig, HostContext, VmConfig};
use thiserror::Error;
use tracing::debug;

mod ini;
mod lines;
mod pipe;
mod structured;

pub use ini::IniSource;
pub use lines::LinesSource;
pub use pipe::PipeSource;
pub use structured::TomlSource;

/// Default location libvirt hook installs read their rules from.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/libvirt/hooks/config.ini";

/// Errors returned while loading a forwarding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{format} config line {line}: {message}")]
    Syntax {
        format: &'static str,
        line: usize,
        message: String,
    },
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("host_ip not found in configuration")]
    MissingHostAddress,
    #[error("could not detect config format (expected ini, lines, pipe or toml)")]
    UnknownFormat,
}

/// Supported file layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Ini,
    Lines,
    Pipe,
    Toml,
}

impl FormatKind {
    pub fn source(self) -> Box<dyn ConfigSource> {
        match self {
            FormatKind::Ini => Box::new(IniSource),
            FormatKind::Lines => Box::new(LinesSource),
            FormatKind::Pipe => Box::new(PipeSource),
            FormatKind::Toml => Box::new(TomlSource),
        }
    }
}

/// Host-level settings and rule fragments as read from one file, before
/// command-line overrides are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    pub host_ip: Option<String>,
    pub bridge: Option<String>,
    pub vms: VmConfig,
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host_ip: Option<String>,
    pub bridge: Option<String>,
}

impl ParsedConfig {
    /// Apply overrides and require a non-empty host address.
    pub fn into_forwarding(self, overrides: &Overrides) -> Result<ForwardingConfig, ConfigError> {
        let host_ip = overrides
            .host_ip
            .clone()
            .or(self.host_ip)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHostAddress)?;

        let mut host = HostContext::new(host_ip);
        if let Some(bridge) = overrides
            .bridge
            .clone()
            .or(self.bridge)
            .filter(|b| !b.trim().is_empty())
        {
            host = host.with_bridge(bridge.trim());
        }

        Ok(ForwardingConfig {
            host,
            vms: self.vms,
        })
    }
}

/// One historical configuration layout.
pub trait ConfigSource {
    fn name(&self) -> &'static str;
    fn parse(&self, raw: &str) -> Result<ParsedConfig, ConfigError>;
}

/// Guess the layout of `raw` from its content.
pub fn detect_format(raw: &str) -> Option<FormatKind> {
    let lines: Vec<&str> = meaningful_lines(raw).map(|(_, line)| line).collect();

    if lines.iter().any(|line| line.starts_with("[[")) {
        return Some(FormatKind::Toml);
    }
    if lines.iter().any(|line| line.starts_with('[')) {
        return Some(FormatKind::Ini);
    }
    if lines.iter().any(|line| pipe_before_equals(line)) {
        return Some(FormatKind::Pipe);
    }
    let has_quoted_value = lines.iter().any(|line| {
        line.split_once('=')
            .is_some_and(|(_, value)| value.trim_start().starts_with('"'))
    });
    if has_quoted_value && is_structured_document(raw) {
        return Some(FormatKind::Toml);
    }
    if lines.iter().any(|line| line.contains('=')) {
        return Some(FormatKind::Lines);
    }
    None
}

/// Parse `raw`, using `format` or detecting it when `None`.
pub fn parse_config(raw: &str, format: Option<FormatKind>) -> Result<ParsedConfig, ConfigError> {
    let kind = match format {
        Some(kind) => kind,
        None => detect_format(raw).ok_or(ConfigError::UnknownFormat)?,
    };
    let source = kind.source();
    debug!(format = source.name(), "parsing forwarding config");
    source.parse(raw)
}

/// Read and parse the config file at `path`.
pub fn load_config(path: &Path, format: Option<FormatKind>) -> Result<ParsedConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw, format)
}

/// Non-blank, non-comment lines with their 1-based line numbers, trimmed.
pub(crate) fn meaningful_lines(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
}

/// Strip one pair of matching surrounding quotes.
pub(crate) fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Quoted values are also legal in the `lines` layout, so only content that
/// parses as TOML and uses nothing but the structured top-level keys counts.
fn is_structured_document(raw: &str) -> bool {
    raw.parse::<toml::Table>().is_ok_and(|table| {
        table
            .keys()
            .all(|key| matches!(key.as_str(), "host_ip" | "bridge" | "vm"))
    })
}

fn pipe_before_equals(line: &str) -> bool {
    match (line.find('|'), line.find('=')) {
        (Some(pipe), Some(eq)) => pipe < eq,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{detect_format, parse_config, unquote, ConfigError, FormatKind, Overrides};
    use portfwd_core::RawFragment;

    #[test]
    fn detects_each_layout() {
        assert_eq!(
            detect_format("[DEFAULT]\nhost_ip = 10.0.0.1\n[web]\na = 1.2.3.4:22->22\n"),
            Some(FormatKind::Ini)
        );
        assert_eq!(
            detect_format("# rules\nhost_ip=10.0.0.1\nweb=1.2.3.4:22->22\n"),
            Some(FormatKind::Lines)
        );
        assert_eq!(
            detect_format("host_ip|10.0.0.1\nweb|1.2.3.4:22->22|allow:10.0.0.0/8\n"),
            Some(FormatKind::Pipe)
        );
        assert_eq!(
            detect_format("host_ip = \"10.0.0.1\"\n[[vm.web]]\nguest = \"1.2.3.4\"\n"),
            Some(FormatKind::Toml)
        );
        assert_eq!(detect_format("host_ip = \"10.0.0.1\"\n"), Some(FormatKind::Toml));
        assert_eq!(
            detect_format("host_ip=\"10.0.0.1\"\nweb=192.168.122.50:443->8443\n"),
            Some(FormatKind::Lines)
        );
        assert_eq!(
            detect_format("host_ip=\"10.0.0.1\"\nweb=\"192.168.122.50:443->8443\"\n"),
            Some(FormatKind::Lines)
        );
        assert_eq!(detect_format("# nothing here\n\n"), None);
    }

    #[test]
    fn every_layout_yields_the_same_config() {
        let samples = [
            "[DEFAULT]\nhost_ip = 10.0.0.1\n\n[web]\nhttps = 192.168.122.50:443->8443\n",
            "host_ip=10.0.0.1\nweb=192.168.122.50:443->8443\n",
            "host_ip|10.0.0.1\nweb|192.168.122.50:443->8443\n",
        ];
        for sample in samples {
            let config = parse_config(sample, None)
                .expect("sample should parse")
                .into_forwarding(&Overrides::default())
                .expect("host ip present");
            assert_eq!(config.host.host_address, "10.0.0.1");
            assert_eq!(config.host.bridge, "virbr0");
            let web = config.vms.get("web").expect("web vm");
            assert_eq!(web.len(), 1);
            assert_eq!(
                portfwd_core::normalize(&web[0])
                    .expect("rule normalizes")
                    .redirect_target(),
                "192.168.122.50:443"
            );
        }
    }

    #[test]
    fn quoted_lines_layout_loads_without_format_hint() {
        let parsed = parse_config("host_ip=\"10.0.0.1\"\nweb=192.168.122.50:443->8443\n", None)
            .expect("quoted lines layout parses");
        assert_eq!(parsed.host_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            parsed.vms["web"],
            vec![RawFragment::Line("192.168.122.50:443->8443".to_string())]
        );
    }

    #[test]
    fn overrides_win_over_file_values() {
        let parsed = parse_config("web=192.168.122.50:443->8443\n", Some(FormatKind::Lines))
            .expect("parse");
        let err = parsed
            .clone()
            .into_forwarding(&Overrides::default())
            .expect_err("host ip missing");
        assert!(matches!(err, ConfigError::MissingHostAddress));

        let config = parsed
            .into_forwarding(&Overrides {
                host_ip: Some("203.0.113.1".to_string()),
                bridge: Some("br0".to_string()),
            })
            .expect("override supplies host ip");
        assert_eq!(config.host.host_address, "203.0.113.1");
        assert_eq!(config.host.bridge, "br0");
        assert_eq!(
            config.vms["web"],
            vec![RawFragment::Line("192.168.122.50:443->8443".to_string())]
        );
    }

    #[test]
    fn undetectable_content_is_rejected() {
        assert!(matches!(
            parse_config("just some words\n", None),
            Err(ConfigError::UnknownFormat)
        ));
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"10.0.0.1\""), "10.0.0.1");
        assert_eq!(unquote("'virbr1'"), "virbr1");
        assert_eq!(unquote("\"half"), "\"half");
    }
}
