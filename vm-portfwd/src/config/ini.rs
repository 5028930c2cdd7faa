use portfwd_core::RawFragment;

use super::{meaningful_lines, unquote, ConfigError, ConfigSource, ParsedConfig};

const DEFAULT_SECTION: &str = "DEFAULT";

/// Sectioned layout: host settings under `[DEFAULT]` (or before any section
/// header), one section per VM whose values are rules.
///
/// ```ini
/// [DEFAULT]
/// host_ip = 10.0.0.1
///
/// [web]
/// https = 192.168.122.50:443->8443,allow:203.0.113.0/24
/// dns   = 192.168.122.50:53->53,protocol:udp
/// ```
///
/// Key names inside a VM section only label the rule. A repeated key replaces
/// the earlier value in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct IniSource;

impl ConfigSource for IniSource {
    fn name(&self) -> &'static str {
        "ini"
    }

    fn parse(&self, raw: &str) -> Result<ParsedConfig, ConfigError> {
        let mut parsed = ParsedConfig::default();
        let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
        let mut current = DEFAULT_SECTION.to_string();

        for (line_no, line) in meaningful_lines(raw) {
            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| syntax(line_no, format!("malformed section header '{line}'")))?;
                current = name.to_string();
                if current != DEFAULT_SECTION && !sections.iter().any(|(n, _)| *n == current) {
                    sections.push((current.clone(), Vec::new()));
                }
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| syntax(line_no, format!("expected 'key = value', got '{line}'")))?;
            let key = key.trim().to_string();
            let value = ini_value(value).to_string();

            if current == DEFAULT_SECTION {
                match key.as_str() {
                    "host_ip" => parsed.host_ip = Some(value),
                    "bridge" => parsed.bridge = Some(value),
                    _ => tracing::debug!(key = %key, "ignoring unknown DEFAULT key"),
                }
                continue;
            }

            let Some((_, entries)) = sections.iter_mut().find(|(n, _)| *n == current) else {
                continue;
            };
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => entries.push((key, value)),
            }
        }

        for (vm, entries) in sections {
            let fragments = entries
                .into_iter()
                .map(|(_, value)| RawFragment::Line(value))
                .collect();
            parsed.vms.insert(vm, fragments);
        }
        Ok(parsed)
    }
}

/// Unquoted values end at the first `#` or `;`, which starts an inline
/// comment. Quoted values are taken as written.
fn ini_value(raw: &str) -> &str {
    let value = raw.trim();
    if value.starts_with(['"', '\'']) {
        return unquote(value);
    }
    match value.find(['#', ';']) {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}

fn syntax(line: usize, message: String) -> ConfigError {
    ConfigError::Syntax {
        format: "ini",
        line,
        message,
    }
}
