//! Source and prebuilt archive installers

use crate::error::{Error, Result};
use crate::shell::quote;
use crate::types::InstallerOptions;

const DEFAULT_PREFIX: &str = "/usr/local";
const DEFAULT_ARCHIVES: &str = "/usr/local/sources";
const DEFAULT_BUILDS: &str = "/usr/local/build";

/// Archive formats recognized by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    TarBz2,
    Tar,
    Zip,
}

impl ArchiveKind {
    const EXTENSIONS: [(&'static str, ArchiveKind); 6] = [
        (".tar.gz", Self::TarGz),
        (".tgz", Self::TarGz),
        (".tar.bz2", Self::TarBz2),
        (".tb2", Self::TarBz2),
        (".tar", Self::Tar),
        (".zip", Self::Zip),
    ];

    /// Detect the archive kind and return the name without extension
    fn detect(archive: &str) -> Result<(Self, &str)> {
        Self::EXTENSIONS
            .iter()
            .find_map(|(ext, kind)| archive.strip_suffix(ext).map(|stem| (*kind, stem)))
            .ok_or_else(|| Error::Config(format!("unknown archive type: {archive}")))
    }

    fn extract_command(self, archive: &str) -> String {
        match self {
            Self::TarGz => format!("tar xzf {archive}"),
            Self::TarBz2 => format!("tar xjf {archive}"),
            Self::Tar => format!("tar xf {archive}"),
            Self::Zip => format!("unzip -o {archive}"),
        }
    }
}

fn archive_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Shared download layout for source and binary archives
struct Layout<'a> {
    url: &'a str,
    archive: &'a str,
    kind: ArchiveKind,
    stem: &'a str,
    prefix: &'a str,
    archives: &'a str,
}

impl<'a> Layout<'a> {
    fn new(url: &'a str, options: &'a InstallerOptions) -> Result<Self> {
        let archive = archive_name(url);
        let (kind, stem) = ArchiveKind::detect(archive)?;
        Ok(Self {
            url,
            archive,
            kind,
            stem,
            prefix: options.prefix.as_deref().unwrap_or(DEFAULT_PREFIX),
            archives: options.archives.as_deref().unwrap_or(DEFAULT_ARCHIVES),
        })
    }

    fn archive_path(&self) -> String {
        format!("{}/{}", self.archives, self.archive)
    }

    fn download_command(&self, sudo: &str) -> String {
        format!(
            "{sudo}wget -cq -O {} {}",
            quote(&self.archive_path()),
            quote(self.url)
        )
    }

    fn extract_in(&self, dir: &str, sudo: &str) -> String {
        let extract = self.kind.extract_command(&quote(&self.archive_path()));
        format!("{sudo}bash -c {}", quote(&format!("cd {dir} && {extract}")))
    }
}

/// Build from source: download, extract, configure, make, make install
pub(super) struct Source<'a> {
    layout: Layout<'a>,
    builds: &'a str,
    options: &'a InstallerOptions,
}

impl<'a> Source<'a> {
    pub(super) fn new(url: &'a str, options: &'a InstallerOptions) -> Result<Self> {
        Ok(Self {
            layout: Layout::new(url, options)?,
            builds: options.builds.as_deref().unwrap_or(DEFAULT_BUILDS),
            options,
        })
    }

    fn build_dir(&self) -> String {
        let dir = self.options.custom_dir.as_deref().unwrap_or(self.layout.stem);
        format!("{}/{dir}", self.builds)
    }

    fn in_build_dir(&self, command: &str, sudo: &str) -> String {
        format!(
            "{sudo}bash -c {}",
            quote(&format!("cd {} && {command}", self.build_dir()))
        )
    }

    pub(super) fn prepare_commands(&self, sudo: &str) -> Vec<String> {
        [self.layout.prefix, self.layout.archives, self.builds]
            .iter()
            .map(|dir| format!("{sudo}mkdir -p {}", quote(dir)))
            .collect()
    }

    fn configure_flags(&self) -> String {
        let mut flags = vec![format!("--prefix={}", self.layout.prefix)];
        flags.extend(self.options.enable.iter().map(|f| format!("--enable-{f}")));
        flags.extend(self.options.with.iter().map(|f| format!("--with-{f}")));
        flags.extend(self.options.configure_flags.iter().cloned());
        flags.join(" ")
    }

    pub(super) fn install_commands(&self, sudo: &str) -> Result<Vec<String>> {
        let name = self.layout.stem;
        let mut commands = vec![
            self.layout.download_command(sudo),
            self.layout.extract_in(self.builds, sudo),
        ];

        if self.options.custom_install.is_empty() {
            commands.push(self.in_build_dir(
                &format!("./configure {} > {name}-configure.log 2>&1", self.configure_flags()),
                sudo,
            ));
            commands.push(self.in_build_dir(&format!("make > {name}-build.log 2>&1"), sudo));
            commands.push(self.in_build_dir(
                &format!("make install > {name}-install.log 2>&1"),
                sudo,
            ));
        } else {
            commands.extend(
                self.options
                    .custom_install
                    .iter()
                    .map(|cmd| self.in_build_dir(cmd, sudo)),
            );
        }

        Ok(commands)
    }
}

/// Prebuilt archive extracted straight into the prefix
pub(super) struct Binary<'a> {
    layout: Layout<'a>,
}

impl<'a> Binary<'a> {
    pub(super) fn new(url: &'a str, options: &'a InstallerOptions) -> Result<Self> {
        Ok(Self {
            layout: Layout::new(url, options)?,
        })
    }

    pub(super) fn prepare_commands(&self, sudo: &str) -> Vec<String> {
        [self.layout.archives, self.layout.prefix]
            .iter()
            .map(|dir| format!("{sudo}mkdir -p {}", quote(dir)))
            .collect()
    }

    pub(super) fn install_commands(&self, sudo: &str) -> Result<Vec<String>> {
        Ok(vec![
            self.layout.download_command(sudo),
            self.layout.extract_in(self.layout.prefix, sudo),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.org/dist/ruby-1.9.3.tar.gz";

    #[test]
    fn test_detect_archive() {
        assert_eq!(
            ArchiveKind::detect("ruby-1.9.3.tar.gz").unwrap(),
            (ArchiveKind::TarGz, "ruby-1.9.3")
        );
        assert_eq!(
            ArchiveKind::detect("tool.tb2").unwrap(),
            (ArchiveKind::TarBz2, "tool")
        );
        assert_eq!(ArchiveKind::detect("x.zip").unwrap(), (ArchiveKind::Zip, "x"));
        assert!(ArchiveKind::detect("x.rar").is_err());
    }

    #[test]
    fn test_source_defaults() {
        let options = InstallerOptions::default();
        let source = Source::new(URL, &options).unwrap();

        assert_eq!(
            source.prepare_commands(""),
            vec![
                "mkdir -p '/usr/local'".to_string(),
                "mkdir -p '/usr/local/sources'".to_string(),
                "mkdir -p '/usr/local/build'".to_string(),
            ]
        );

        let commands = source.install_commands("").unwrap();
        assert_eq!(commands.len(), 5);
        assert_eq!(
            commands[0],
            "wget -cq -O '/usr/local/sources/ruby-1.9.3.tar.gz' 'http://example.org/dist/ruby-1.9.3.tar.gz'"
        );
        assert!(commands[1].contains("cd /usr/local/build && tar xzf"));
        assert!(commands[2].contains("cd /usr/local/build/ruby-1.9.3 && ./configure --prefix=/usr/local"));
        assert!(commands[4].contains("make install > ruby-1.9.3-install.log 2>&1"));
    }

    #[test]
    fn test_source_flags_and_custom_install() {
        let options = InstallerOptions {
            prefix: Some("/opt/ruby".into()),
            enable: vec!["shared".into()],
            with: vec!["openssl-dir=/usr".into()],
            custom_dir: Some("ruby".into()),
            ..Default::default()
        };
        let source = Source::new(URL, &options).unwrap();
        assert_eq!(
            source.configure_flags(),
            "--prefix=/opt/ruby --enable-shared --with-openssl-dir=/usr"
        );
        assert_eq!(source.build_dir(), "/usr/local/build/ruby");

        let options = InstallerOptions {
            custom_install: vec!["ruby setup.rb".into()],
            ..Default::default()
        };
        let commands = Source::new(URL, &options).unwrap().install_commands("sudo ").unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(
            commands[2],
            "sudo bash -c 'cd /usr/local/build/ruby-1.9.3 && ruby setup.rb'"
        );
    }

    #[test]
    fn test_binary_extracts_into_prefix() {
        let options = InstallerOptions {
            prefix: Some("/opt/node".into()),
            ..Default::default()
        };
        let binary = Binary::new("http://example.org/node.tar.bz2", &options).unwrap();
        let commands = binary.install_commands("").unwrap();
        assert!(commands[1].starts_with("bash -c 'cd /opt/node && tar xjf"));
    }
}
