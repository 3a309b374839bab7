//! Delivery transports: run commands and copy files on role hosts

mod local;
mod ssh;

pub use local::LocalDelivery;
pub use ssh::SshDelivery;

use crate::schema::{DeliveryConfig, DeliveryKind};
use provision::{Delivery, DeliveryError};
use std::collections::BTreeMap;
use std::process::{Command, Output};

/// Build the transport configured in `[delivery]`
pub fn from_config(
    config: &DeliveryConfig,
    roles: &BTreeMap<String, Vec<String>>,
) -> Box<dyn Delivery> {
    match config.kind {
        DeliveryKind::Local => {
            log::debug!("Using local delivery");
            Box::new(LocalDelivery)
        }
        DeliveryKind::Ssh => {
            log::debug!("Using ssh delivery for {} roles", roles.len());
            Box::new(SshDelivery::new(config, roles.clone()))
        }
    }
}

/// Run a program to completion, capturing its output
fn execute(program: &str, args: &[String]) -> Result<Output, DeliveryError> {
    log::trace!("{} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .output()
        .map_err(|source| DeliveryError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Map a finished process to success or a `CommandFailed` for `host`
fn check_output(host: &str, output: &Output) -> Result<(), DeliveryError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        log::debug!("[{}] {}", host, line);
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(DeliveryError::CommandFailed {
            host: host.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
