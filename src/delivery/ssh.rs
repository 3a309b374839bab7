use super::{check_output, execute};
use crate::schema::DeliveryConfig;
use provision::{Delivery, DeliveryError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// ssh exits with 255 when the connection itself failed
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Runs commands over ssh on every host of the targeted roles
///
/// Hosts are contacted in parallel; a call succeeds only when every host
/// succeeded.
pub struct SshDelivery {
    user: Option<String>,
    port: Option<u16>,
    options: Vec<String>,
    roles: BTreeMap<String, Vec<String>>,
}

impl SshDelivery {
    pub fn new(config: &DeliveryConfig, roles: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            user: config.user.clone(),
            port: config.port,
            options: config.ssh_options.clone(),
            roles,
        }
    }

    /// Hosts of every role, first occurrence wins; an empty target is an error
    fn hosts(&self, roles: &[String]) -> Result<Vec<String>, DeliveryError> {
        let mut hosts: Vec<String> = Vec::new();
        for role in roles {
            let role_hosts = self
                .roles
                .get(role)
                .ok_or_else(|| DeliveryError::UnknownRole(role.clone()))?;
            for host in role_hosts {
                if !hosts.contains(host) {
                    hosts.push(host.clone());
                }
            }
        }
        if hosts.is_empty() {
            return Err(DeliveryError::NoHosts(roles.to_vec()));
        }
        Ok(hosts)
    }

    fn destination(&self, host: &str) -> String {
        match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        }
    }

    fn option_args(&self) -> Vec<String> {
        self.options
            .iter()
            .flat_map(|o| ["-o".to_string(), o.clone()])
            .collect()
    }

    fn ssh_args(&self, host: &str, command: &str) -> Vec<String> {
        let mut args = self.option_args();
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.destination(host));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn scp_args(&self, host: &str, source: &Path, destination: &str, recursive: bool) -> Vec<String> {
        let mut args = self.option_args();
        if recursive {
            args.push("-r".to_string());
        }
        if let Some(port) = self.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }
        args.push(source.to_string_lossy().into_owned());
        args.push(format!("{}:{}", self.destination(host), destination));
        args
    }

    /// Run `program` once per host in parallel and require every host to pass
    fn fan_out<F>(&self, roles: &[String], program: &str, args: F) -> Result<(), DeliveryError>
    where
        F: Fn(&str) -> Vec<String> + Sync,
    {
        let hosts = self.hosts(roles)?;
        let results: Vec<Result<(), DeliveryError>> = hosts
            .par_iter()
            .map(|host| {
                let output = execute(program, &args(host.as_str()))?;
                check_output(host, &output)
            })
            .collect();

        results.into_iter().collect()
    }
}

impl Delivery for SshDelivery {
    fn run(&self, package: &str, commands: &str, roles: &[String]) -> Result<(), DeliveryError> {
        log::debug!("{} on {:?}: {}", package, roles, commands);
        self.fan_out(roles, "ssh", |host| self.ssh_args(host, commands))
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
            "{} on {:?}: upload {} to {}",
            package,
            roles,
            source.display(),
            destination
        );
        self.fan_out(roles, "scp", |host| {
            self.scp_args(host, source, destination, recursive)
        })
    }

    fn probe(&self, package: &str, command: &str, roles: &[String]) -> Result<bool, DeliveryError> {
        log::trace!("{} probe on {:?}: {}", package, roles, command);
        let hosts = self.hosts(roles)?;
        let results: Vec<Result<bool, DeliveryError>> = hosts
            .par_iter()
            .map(|host| {
                let output = execute("ssh", &self.ssh_args(host, command))?;
                match output.status.code() {
                    Some(SSH_CONNECTION_FAILURE) => Err(DeliveryError::Other(format!(
                        "ssh connection to {} failed: {}",
                        host,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ))),
                    _ => Ok(output.status.success()),
                }
            })
            .collect();

        let mut passed = true;
        for result in results {
            passed &= result?;
        }
        Ok(passed)
    }
}
