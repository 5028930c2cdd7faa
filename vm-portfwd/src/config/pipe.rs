use portfwd_core::RawFragment;

use super::{meaningful_lines, ConfigError, ConfigSource, ParsedConfig};

/// Pipe-delimited layout: the first field names a VM (or a host setting),
/// the rest is the rule with `|`-separated options.
///
/// ```text
/// host_ip|10.0.0.1
/// web|192.168.122.50:443->8443|allow:203.0.113.0/24
/// dns|192.168.122.53:53->53|protocol:udp
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeSource;

impl ConfigSource for PipeSource {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn parse(&self, raw: &str) -> Result<ParsedConfig, ConfigError> {
        let mut parsed = ParsedConfig::default();

        for (line_no, line) in meaningful_lines(raw) {
            let (name, rest) = line
                .split_once('|')
                .map(|(name, rest)| (name.trim(), rest.trim()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| ConfigError::Syntax {
                    format: "pipe",
                    line: line_no,
                    message: format!("expected 'name|value', got '{line}'"),
                })?;

            match name {
                "host_ip" => parsed.host_ip = Some(rest.to_string()),
                "bridge" => parsed.bridge = Some(rest.to_string()),
                vm => parsed
                    .vms
                    .entry(vm.to_string())
                    .or_default()
                    .push(RawFragment::Options(rest.to_string())),
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::PipeSource;
    use crate::config::{ConfigError, ConfigSource};
    use portfwd_core::{normalize, Protocol, RawFragment};

    #[test]
    fn options_stay_attached_to_rule() {
        let parsed = PipeSource
            .parse("host_ip|10.0.0.1\ndns|192.168.122.53:53->53|protocol:udp\n")
            .expect("valid pipe config");
        assert_eq!(parsed.host_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            parsed.vms["dns"],
            vec![RawFragment::Options(
                "192.168.122.53:53->53|protocol:udp".to_string()
            )]
        );

        let rule = normalize(&parsed.vms["dns"][0]).expect("rule normalizes");
        assert_eq!(rule.protocol(), Protocol::Udp);
    }

    #[test]
    fn rejects_lines_without_pipe() {
        assert!(matches!(
            PipeSource.parse("host_ip|10.0.0.1\nweb 10.0.0.5:22->22\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        ));
    }
}
