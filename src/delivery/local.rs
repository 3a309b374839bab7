use super::{check_output, execute};
use provision::{Delivery, DeliveryError};
use std::path::Path;

const HOST: &str = "localhost";

/// Runs everything on this machine, whatever the roles
pub struct LocalDelivery;

impl LocalDelivery {
    fn shell_args(commands: &str) -> Vec<String> {
        vec!["-c".to_string(), commands.to_string()]
    }

    fn copy_args(source: &Path, destination: &str, recursive: bool) -> Vec<String> {
        let mut args = Vec::new();
        if recursive {
            args.push("-R".to_string());
        }
        args.push(source.to_string_lossy().into_owned());
        args.push(destination.to_string());
        args
    }
}

impl Delivery for LocalDelivery {
    fn run(&self, package: &str, commands: &str, roles: &[String]) -> Result<(), DeliveryError> {
        log::debug!("{} on {:?} (local): {}", package, roles, commands);
        let output = execute("sh", &Self::shell_args(commands))?;
        check_output(HOST, &output)
    }

    fn transfer(
        &self,
        package: &str,
        source: &Path,
        destination: &str,
        roles: &[String],
        recursive: bool,
    ) -> Result<(), DeliveryError> {
        log::debug!(
            "{} on {:?} (local): copy {} to {}",
            package,
            roles,
            source.display(),
            destination
        );
        let output = execute("cp", &Self::copy_args(source, destination, recursive))?;
        check_output(HOST, &output)
    }

    fn probe(&self, package: &str, command: &str, _roles: &[String]) -> Result<bool, DeliveryError> {
        log::trace!("{} probe (local): {}", package, command);
        let output = execute("sh", &Self::shell_args(command))?;
        Ok(output.status.success())
    }
}
