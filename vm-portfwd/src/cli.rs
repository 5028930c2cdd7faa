use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use vm_portfwd::config::{FormatKind, DEFAULT_CONFIG_PATH};
use vm_portfwd::report::PlanStyle;

pub const USAGE: &str = "Usage: vm-portfwd <VM_NAME> <start|stopped|reconnect>";

#[derive(Parser, Debug)]
#[command(name = "vm-portfwd")]
#[command(about = "Apply per-VM port forwards as iptables rules on libvirt lifecycle events")]
pub struct Cli {
    /// VM name as passed by libvirt.
    pub vm: Option<String>,
    /// Lifecycle action: start, stopped or reconnect.
    pub action: Option<String>,
    /// Remaining hook arguments from libvirt (sub-operation, extra); ignored.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub extra: Vec<String>,
    /// Forwarding config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Config layout (`auto` inspects the file).
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    pub format: ConfigFormat,
    /// Host address DNAT rules match on; overrides the config file.
    #[arg(long)]
    pub host_ip: Option<String>,
    /// Guest bridge interface; overrides the config file.
    #[arg(long)]
    pub bridge: Option<String>,
    /// Firewall utility to run.
    #[arg(long, default_value = "iptables")]
    pub iptables: String,
    /// Print the planned operations instead of applying them.
    #[arg(long)]
    pub dry_run: bool,
    /// Plan output format for --dry-run.
    #[arg(long, value_enum, default_value_t = PlanOutput::Text)]
    pub output: PlanOutput,
    /// Exit non-zero on missing VM, bad config, skipped rules or failed operations.
    #[arg(long)]
    pub strict: bool,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ConfigFormat {
    Auto,
    Ini,
    Lines,
    Pipe,
    Toml,
}

impl ConfigFormat {
    pub fn kind(self) -> Option<FormatKind> {
        match self {
            ConfigFormat::Auto => None,
            ConfigFormat::Ini => Some(FormatKind::Ini),
            ConfigFormat::Lines => Some(FormatKind::Lines),
            ConfigFormat::Pipe => Some(FormatKind::Pipe),
            ConfigFormat::Toml => Some(FormatKind::Toml),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum PlanOutput {
    Text,
    Commands,
    Json,
}

impl From<PlanOutput> for PlanStyle {
    fn from(output: PlanOutput) -> Self {
        match output {
            PlanOutput::Text => PlanStyle::Text,
            PlanOutput::Commands => PlanStyle::Commands,
            PlanOutput::Json => PlanStyle::Json,
        }
    }
}
