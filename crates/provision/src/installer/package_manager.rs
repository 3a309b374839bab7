//! One-line install commands for OS and language package managers

use crate::shell::quote;
use crate::types::InstallerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Yum,
    Rpm,
    /// Debian packages downloaded from URLs
    Deb,
    Gem,
    FreebsdPkg,
    OpenbsdPkg,
    OpensolarisPkg,
    MacPort,
    BsdPort,
    FreebsdPortinstall,
}

impl PackageManager {
    pub const ALL: [PackageManager; 11] = [
        Self::Apt,
        Self::Yum,
        Self::Rpm,
        Self::Deb,
        Self::Gem,
        Self::FreebsdPkg,
        Self::OpenbsdPkg,
        Self::OpensolarisPkg,
        Self::MacPort,
        Self::BsdPort,
        Self::FreebsdPortinstall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Yum => "yum",
            Self::Rpm => "rpm",
            Self::Deb => "deb",
            Self::Gem => "gem",
            Self::FreebsdPkg => "freebsd_pkg",
            Self::OpenbsdPkg => "openbsd_pkg",
            Self::OpensolarisPkg => "opensolaris_pkg",
            Self::MacPort => "mac_port",
            Self::BsdPort => "bsd_port",
            Self::FreebsdPortinstall => "freebsd_portinstall",
        }
    }

    /// Look up a manager by its declaration name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Commands installing `packages`
    pub fn install_commands(&self, packages: &[String], options: &InstallerOptions) -> Vec<String> {
        let sudo = options.sudo_prefix();
        let list = packages.join(" ");

        match self {
            Self::Apt => vec![format!(
                "{sudo}env DEBCONF_TERSE='yes' DEBIAN_PRIORITY='critical' DEBIAN_FRONTEND=noninteractive apt-get -qyu install {list}"
            )],
            Self::Yum => vec![format!("{sudo}yum install {list} -y")],
            Self::Rpm => vec![format!("{sudo}rpm -Uvh {list}")],
            Self::Deb => {
                let mut commands: Vec<String> = packages
                    .iter()
                    .map(|url| format!("{sudo}wget -cq --directory-prefix=/tmp {}", quote(url)))
                    .collect();
                let files: Vec<String> = packages
                    .iter()
                    .map(|url| quote(&format!("/tmp/{}", basename(url))))
                    .collect();
                commands.push(format!("{sudo}dpkg -i {}", files.join(" ")));
                commands
            }
            Self::Gem => packages
                .iter()
                .map(|name| gem_command(name, options, sudo))
                .collect(),
            Self::FreebsdPkg => vec![format!("{sudo}pkg_add -r {list}")],
            Self::OpenbsdPkg => vec![format!("{sudo}pkg_add {list}")],
            Self::OpensolarisPkg => vec![format!("{sudo}pkg install {list}")],
            Self::MacPort => vec![format!("{sudo}port install {list}")],
            Self::BsdPort => packages
                .iter()
                .map(|port| {
                    format!("{sudo}sh -c 'cd /usr/ports/{port} && make BATCH=yes install clean'")
                })
                .collect(),
            Self::FreebsdPortinstall => vec![format!("{sudo}portinstall --batch {list}")],
        }
    }
}

fn gem_command(name: &str, options: &InstallerOptions, sudo: &str) -> String {
    let mut cmd = format!("{sudo}gem install {name}");
    if let Some(version) = &options.version {
        cmd.push_str(&format!(" --version {}", quote(version)));
    }
    if let Some(source) = &options.gem_source {
        cmd.push_str(&format!(" --source {}", quote(source)));
    }
    if let Some(dir) = &options.install_dir {
        cmd.push_str(&format!(" --install-dir {}", quote(dir)));
    }
    if let Some(flags) = &options.build_flags {
        cmd.push_str(&format!(" -- {flags}"));
    }
    cmd
}

fn basename(url: &str) -> &str {
    Path::new(url)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(url)
}
