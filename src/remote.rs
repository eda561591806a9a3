//! Remote file access over a shell channel (`ssh` by default).

use std::process::{Command, Stdio};

use crate::error::RemoteError;

/// Number of stderr lines kept in a failure message.
const DIAGNOSTIC_LINES: usize = 5;

/// Lists and reads files on remote hosts.
pub trait RemoteShell: Send + Sync {
    /// Paths on `host` matching the shell glob `pattern`.
    fn list_glob(&self, host: &str, pattern: &str) -> Result<Vec<String>, RemoteError>;

    /// Contents of `path` on `host`.
    fn read_file(&self, host: &str, path: &str) -> Result<Vec<u8>, RemoteError>;
}

/// [`RemoteShell`] that runs `ls`/`cat` through `ssh <host> <command>`.
#[derive(Debug, Clone)]
pub struct SshShell {
    program: String,
    options: Vec<String>,
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SshShell {
    /// `ssh -o BatchMode=yes`, so an unreachable or password-protected host
    /// fails instead of prompting.
    pub fn new() -> Self {
        Self {
            program: "ssh".into(),
            options: vec!["-o".into(), "BatchMode=yes".into()],
        }
    }

    /// Use another program, invoked as `<program> <options...> <host> <command>`.
    pub fn with_program(program: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }

    fn run(&self, host: &str, remote_command: &str) -> Result<Vec<u8>, RemoteError> {
        tracing::debug!(host, command = remote_command, "running remote command");
        let output = Command::new(&self.program)
            .args(&self.options)
            .arg(host)
            .arg(remote_command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RemoteError::Spawn {
                command: format!("{} {host} {remote_command}", self.program),
                source,
            })?;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                host: host.to_owned(),
                command: remote_command.to_owned(),
                status: output.status.to_string(),
                diagnostics: tail_lines(&String::from_utf8_lossy(&output.stderr), DIAGNOSTIC_LINES),
            });
        }
        Ok(output.stdout)
    }
}

impl RemoteShell for SshShell {
    fn list_glob(&self, host: &str, pattern: &str) -> Result<Vec<String>, RemoteError> {
        let stdout = self.run(host, &format!("ls -1d -- {}", glob_quote(pattern)))?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    fn read_file(&self, host: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.run(host, &format!("cat -- {}", shell_quote(path)))
    }
}

/// Split `host:path`. The host must be non-empty and free of `/`, and the
/// path non-empty.
pub fn split_remote(token: &str) -> Option<(&str, &str)> {
    let (host, path) = token.split_once(':')?;
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@'));
    if host_ok && !path.is_empty() && !path.starts_with("//") {
        Some((host, path))
    } else {
        None
    }
}

/// Whether a remote path is a glob pattern.
pub fn is_glob(path: &str) -> bool {
    path.contains(['*', '?'])
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote everything except the wildcard characters, so the remote shell
/// expands the glob but nothing else in the pattern.
fn glob_quote(pattern: &str) -> String {
    let mut quoted = String::new();
    let mut literal = String::new();
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '[' | ']') {
            if !literal.is_empty() {
                quoted.push_str(&shell_quote(&literal));
                literal.clear();
            }
            quoted.push(c);
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        quoted.push_str(&shell_quote(&literal));
    }
    quoted
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
