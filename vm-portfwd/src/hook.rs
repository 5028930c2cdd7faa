use anyhow::{bail, Result};
use portfwd_core::{dispatch, ForwardError};
use tracing::{error, info};
use vm_portfwd::backend::{DryRunBackend, IptablesBackend};
use vm_portfwd::config::{load_config, Overrides};
use vm_portfwd::report::{render_plan, render_summary};

use crate::cli::Cli;

/// Handle one hook invocation for `vm` and `action`.
///
/// libvirt blocks a VM's lifecycle when a hook exits non-zero, so outside
/// `--strict` every problem is logged and the hook still succeeds.
pub fn run_hook(cli: &Cli, vm: &str, action: &str) -> Result<()> {
    if !cli.extra.is_empty() {
        tracing::debug!(extra = ?cli.extra, "ignoring extra hook arguments");
    }

    let overrides = Overrides {
        host_ip: cli.host_ip.clone(),
        bridge: cli.bridge.clone(),
    };
    let config = match load_config(&cli.config, cli.format.kind())
        .and_then(|parsed| parsed.into_forwarding(&overrides))
    {
        Ok(config) => config,
        Err(err) => {
            let err = ForwardError::ConfigInvalid(err.to_string());
            return fatal(
                cli.strict,
                anyhow::Error::new(err)
                    .context(format!("failed to load {}", cli.config.display())),
            );
        }
    };

    let outcome = if cli.dry_run {
        let mut backend = DryRunBackend::default();
        let outcome = dispatch(&config, vm, action, &mut backend);
        if outcome.is_ok() {
            println!(
                "{}",
                render_plan(backend.operations(), cli.output.into(), &cli.iptables)
            );
        }
        outcome
    } else {
        let mut backend = IptablesBackend::new(cli.iptables.clone());
        dispatch(&config, vm, action, &mut backend)
    };

    match outcome {
        Ok(report) => {
            if cli.dry_run && !cli.quiet {
                eprintln!("{}", render_summary(&report));
            }
            if cli.strict && !report.is_clean() {
                bail!(
                    "strict mode failed: {} rule(s) skipped, {} operation(s) failed",
                    report.rules_skipped,
                    report.operations_failed
                );
            }
            Ok(())
        }
        Err(ForwardError::UnknownAction(action)) => {
            info!(%action, "ignoring lifecycle action without port forwarding");
            Ok(())
        }
        Err(err) => fatal(cli.strict, anyhow::Error::new(err)),
    }
}

fn fatal(strict: bool, err: anyhow::Error) -> Result<()> {
    if strict {
        return Err(err);
    }
    error!("{err:#}");
    Ok(())
}
