//! Append text to a remote file

use crate::shell::quote;

/// The append command; `sudo` applies to `tee`, which does the writing
///
/// `printf '%s\n'` writes the text verbatim, so only shell quoting is needed.
pub(super) fn append_command(text: &str, path: &str, sudo: &str) -> String {
    format!("printf '%s\\n' {} |{sudo}tee -a {}", quote(text), quote(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    /// Run the generated command locally and return the file contents
    fn append_locally(text: &str) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.txt");
        let command = append_command(text, &path.to_string_lossy(), "");
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdout(std::process::Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "command failed: {command}");
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_append_command() {
        assert_eq!(
            append_command("it's on", "/etc/motd", ""),
            r"printf '%s\n' 'it'\''s on' |tee -a '/etc/motd'"
        );
        assert_eq!(
            append_command("a\nb", "/etc/motd", "sudo "),
            "printf '%s\\n' 'a\nb' |sudo tee -a '/etc/motd'"
        );
    }

    #[test]
    fn test_append_reproduces_text() {
        let samples = [
            "plain",
            "quote ' inside",
            "two\nlines",
            r"back\slash and \n literal",
            "mixed 'a'\\b\nc",
            "-n",
            "-e",
            "-E",
            "%s %d 100%",
            "$HOME `id` $(id)",
        ];
        for text in samples {
            let written = append_locally(text);
            assert_eq!(written, format!("{text}\n").into_bytes(), "sample: {text:?}");
        }
    }

    #[test]
    fn test_append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost\n").unwrap();
        let command = append_command("10.0.0.5 db1", &path.to_string_lossy(), "");
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdout(std::process::Stdio::null())
            .status()
            .unwrap();
        assert!(status.success());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "127.0.0.1 localhost\n10.0.0.5 db1\n"
        );
    }
}
