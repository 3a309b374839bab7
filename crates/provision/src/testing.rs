//! Recording delivery used by unit tests

use crate::context::Delivery;
use crate::error::DeliveryError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One call made against the delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run {
        package: String,
        commands: String,
        roles: Vec<String>,
    },
    Transfer {
        package: String,
        source: PathBuf,
        destination: String,
        roles: Vec<String>,
        recursive: bool,
        /// Content of the source file at transfer time
        content: Option<String>,
    },
    Probe {
        package: String,
        command: String,
        roles: Vec<String>,
    },
}

impl Call {
    pub fn run(package: &str, commands: &str, roles: &[&str]) -> Self {
        Self::Run {
            package: package.to_string(),
            commands: commands.to_string(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    pub fn package(&self) -> &str {
        match self {
            Self::Run { package, .. }
            | Self::Transfer { package, .. }
            | Self::Probe { package, .. } => package,
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    // Remaining failures per probe command; `None` fails forever
    failing_probes: HashMap<String, Option<usize>>,
    fail_runs: bool,
}

/// Delivery that records calls; every probe passes unless told otherwise
#[derive(Default)]
pub struct RecordingDelivery {
    state: Mutex<State>,
}

impl RecordingDelivery {
    /// Make `command` fail every time it is probed
    pub fn fail_probe(&self, command: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_probes
            .insert(command.to_string(), None);
    }

    /// Make `command` fail for the next `times` probes, then pass
    pub fn fail_probe_times(&self, command: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failing_probes
            .insert(command.to_string(), Some(times));
    }

    /// Make every `run` call fail
    pub fn fail_runs(&self) {
        self.state.lock().unwrap().fail_runs = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn probes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Probe { .. }))
            .collect()
    }
}

impl Delivery for RecordingDelivery {
    fn run(&self, package: &str, commands: &str, roles: &[String]) -> Result<(), DeliveryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Run {
            package: package.to_string(),
            commands: commands.to_string(),
            roles: roles.to_vec(),
        });
        if state.fail_runs {
            return Err(DeliveryError::CommandFailed {
                host: "test".into(),
                code: Some(1),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn transfer(
        &self,
        package: &str,
        source: &Path,
        destination: &str,
        roles: &[String],
        recursive: bool,
    ) -> Result<(), DeliveryError> {
        let content = std::fs::read_to_string(source).ok();
        self.state.lock().unwrap().calls.push(Call::Transfer {
            package: package.to_string(),
            source: source.to_path_buf(),
            destination: destination.to_string(),
            roles: roles.to_vec(),
            recursive,
            content,
        });
        Ok(())
    }

    fn probe(&self, package: &str, command: &str, roles: &[String]) -> Result<bool, DeliveryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Probe {
            package: package.to_string(),
            command: command.to_string(),
            roles: roles.to_vec(),
        });

        let passed = match state.failing_probes.get_mut(command) {
            None => true,
            Some(None) => false,
            Some(Some(0)) => true,
            Some(Some(remaining)) => {
                *remaining -= 1;
                false
            }
        };
        Ok(passed)
    }
}
