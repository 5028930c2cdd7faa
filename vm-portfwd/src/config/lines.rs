use portfwd_core::RawFragment;

use super::{meaningful_lines, unquote, ConfigError, ConfigSource, ParsedConfig};

/// Flat `key=value` layout. `host_ip` and `bridge` are host settings; any
/// other key is a VM name and may repeat, one rule per line.
///
/// ```text
/// host_ip=10.0.0.1
/// web=192.168.122.50:443->8443,allow:203.0.113.0/24
/// web=192.168.122.50:80->8080
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LinesSource;

impl ConfigSource for LinesSource {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn parse(&self, raw: &str) -> Result<ParsedConfig, ConfigError> {
        let mut parsed = ParsedConfig::default();

        for (line_no, line) in meaningful_lines(raw) {
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    format: "lines",
                    line: line_no,
                    message: format!("expected 'key=value', got '{line}'"),
                });
            };
            let key = key.trim();
            let value = unquote(value).to_string();

            match key {
                "host_ip" => parsed.host_ip = Some(value),
                "bridge" => parsed.bridge = Some(value),
                "" => {
                    return Err(ConfigError::Syntax {
                        format: "lines",
                        line: line_no,
                        message: "missing VM name before '='".to_string(),
                    })
                }
                vm => parsed
                    .vms
                    .entry(vm.to_string())
                    .or_default()
                    .push(RawFragment::Line(value)),
            }
        }
        Ok(parsed)
    }
}
