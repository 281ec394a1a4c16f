//! Shell command execution for sensitive settings.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tiercfg_core::{ConfigError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs a command line and returns its decoded standard output.
///
/// Implementations must fail with [`ConfigError::CommandExecution`] when the
/// command exits non-zero.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> Result<String>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn run(&self, command: &str) -> Result<String> {
        self(command)
    }
}

/// Executes commands through `sh -c`, blocking until they exit.
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner {
    timeout: Option<Duration>,
}

struct CapturedOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the command's whole process group once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn build(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run_to_completion(command: &str) -> Result<CapturedOutput> {
        let output = Self::build(command)
            .output()
            .map_err(|source| spawn_error(command, source))?;
        Ok(CapturedOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: decode(&output.stdout),
            stderr: decode(&output.stderr),
        })
    }

    fn run_with_timeout(command: &str, timeout: Duration) -> Result<CapturedOutput> {
        let mut cmd = Self::build(command);
        // New process group so a timeout can take down the shell's children too.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| spawn_error(command, source))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        loop {
            let status = child
                .try_wait()
                .map_err(|source| spawn_error(command, source))?;
            if let Some(status) = status {
                return Ok(CapturedOutput {
                    success: status.success(),
                    exit_code: status.code().unwrap_or(-1),
                    stdout: collect(stdout),
                    stderr: collect(stderr),
                });
            }
            if start.elapsed() >= timeout {
                kill_process_group(&mut child);
                let _ = child.wait();
                return Err(ConfigError::CommandTimeout {
                    command: command.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) -> Result<String> {
        tracing::debug!(command, "Executing config command");
        let output = match self.timeout {
            Some(timeout) => Self::run_with_timeout(command, timeout)?,
            None => Self::run_to_completion(command)?,
        };

        if !output.success {
            return Err(ConfigError::CommandExecution {
                command: command.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }
}

fn spawn_error(command: &str, source: std::io::Error) -> ConfigError {
    ConfigError::CommandSpawn {
        command: command.to_string(),
        source,
    }
}

/// Undecodable bytes are dropped rather than failing the whole lookup.
fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    decode(&handle.join().unwrap_or_default())
}

fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: kill() has no memory-safety preconditions. The negative PID
        // targets the process group created by process_group(0).
        unsafe {
            libc::kill(-(child.id() as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
}
