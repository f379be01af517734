//! Command execution on the Cygnus host, locally or over `ssh`.

use crate::domain::models::SshCredentials;
use crate::error::{BdtiError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
const SSH_CONNECT_TIMEOUT_SECS: u64 = 5;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait CommandChannel {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput>;
    fn upload(&self, local: &Path, remote: &Path) -> Result<()>;
    /// Cheap round trip proving the channel works.
    fn verify(&self) -> Result<()>;
    fn describe(&self) -> String;
}

/// Quotes one argument for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_string(&mut buf);
        }
        buf
    })
}

/// Runs `cmd` to completion or kills it once `timeout` elapses.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    let label = format!("{cmd:?}");
    let mut child: Child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(command = %label, secs = timeout.as_secs(), "command timed out");
            return Err(BdtiError::CommandTimedOut {
                command: label,
                secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        status: status.code().unwrap_or(-1),
    })
}

#[derive(Debug, Clone)]
pub struct LocalShell {
    timeout: Duration,
}

impl LocalShell {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for LocalShell {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(CommandOutput::default());
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        tracing::debug!(command = %argv.join(" "), "running local command");
        run_with_timeout(cmd, self.timeout)
    }

    fn upload(&self, local: &Path, remote: &Path) -> Result<()> {
        if local != remote {
            std::fs::copy(local, remote)?;
        }
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SshChannel {
    host: String,
    credentials: SshCredentials,
    timeout: Duration,
}

impl SshChannel {
    pub fn new(host: &str, credentials: SshCredentials) -> Self {
        Self {
            host: host.to_string(),
            credentials,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.credentials.username, self.host)
    }

    fn common_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.credentials.key_path.clone(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={SSH_CONNECT_TIMEOUT_SECS}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ]
    }

    /// Arguments handed to `ssh` for one remote command.
    pub fn ssh_args(&self, argv: &[String]) -> Vec<String> {
        let mut args = self.common_options();
        args.push(self.destination());
        args.push(
            argv.iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        );
        args
    }

    pub fn scp_args(&self, local: &Path, remote: &Path) -> Vec<String> {
        let mut args = self.common_options();
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.destination(), remote.display()));
        args
    }
}

impl CommandChannel for SshChannel {
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(argv));
        tracing::debug!(host = %self.host, command = %argv.join(" "), "running remote command");
        run_with_timeout(cmd, self.timeout)
    }

    fn upload(&self, local: &Path, remote: &Path) -> Result<()> {
        let mut cmd = Command::new("scp");
        cmd.args(self.scp_args(local, remote));
        let out = run_with_timeout(cmd, self.timeout)?;
        if !out.success() {
            return Err(BdtiError::CommandFailed {
                command: format!("scp {}", local.display()),
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            });
        }
        tracing::debug!(host = %self.host, file = %remote.display(), "uploaded");
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        match self.execute(&["true".to_string()]) {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => {
                tracing::debug!(host = %self.host, status = out.status, stderr = %out.stderr.trim(), "ssh check failed");
                Err(BdtiError::AgentHostUnreachable(self.host.clone()))
            }
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "ssh check failed");
                Err(BdtiError::AgentHostUnreachable(self.host.clone()))
            }
        }
    }

    fn describe(&self) -> String {
        format!("ssh {}", self.destination())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quoting_leaves_plain_words_alone() {
        assert_eq!(shell_quote("docker"), "docker");
        assert_eq!(shell_quote("/var/tmp/agent.conf:/opt/x:ro"), "/var/tmp/agent.conf:/opt/x:ro");
        assert_eq!(shell_quote("{{.ID}}|{{.Image}}"), "'{{.ID}}|{{.Image}}'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn ssh_args_use_key_and_batch_mode() {
        let ch = SshChannel::new(
            "10.0.0.2",
            SshCredentials {
                key_path: "/home/op/.ssh/id_rsa".into(),
                username: "op".into(),
            },
        );
        let args = ch.ssh_args(&argv(&["sudo", "docker", "ps", "--format", "{{.ID}}"]));
        assert_eq!(args[0..2], ["-i", "/home/op/.ssh/id_rsa"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=5".to_string()));
        assert_eq!(args[args.len() - 2], "op@10.0.0.2");
        assert_eq!(args[args.len() - 1], "sudo docker ps --format '{{.ID}}'");

        let scp = ch.scp_args(Path::new("/var/tmp/agent.conf"), Path::new("/var/tmp/agent.conf"));
        assert_eq!(scp.last().unwrap(), "op@10.0.0.2:/var/tmp/agent.conf");
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_captures_output_and_status() {
        let shell = LocalShell::new();
        let out = shell.execute(&argv(&["sh", "-c", "echo out; echo err >&2; exit 3"])).unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.status, 3);
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_is_killed() {
        let shell = LocalShell::with_timeout(Duration::from_millis(200));
        let err = shell.execute(&argv(&["sleep", "5"])).unwrap_err();
        assert_eq!(err.code(), "COMMAND_TIMED_OUT");
    }
}
