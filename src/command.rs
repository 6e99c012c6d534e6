use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("failed to read output of {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub success: bool,
}

impl CommandOutput {
    pub fn text(&self) -> String {
        decode_stdout(&self.stdout)
    }

    /// Raw `\n` count, so a missing trailing newline is not counted as a line.
    pub fn line_count(&self) -> usize {
        self.stdout.iter().filter(|&&b| b == b'\n').count()
    }
}

/// Runs external tools by argument vector, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    search_path: Option<OsString>,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            search_path: None,
        }
    }

    /// Resolve programs against `path` instead of the process `PATH`.
    #[cfg(test)]
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn find(&self, program: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(program, Some(paths), cwd).ok()
            }
            None => which::which(program).ok(),
        }
    }

    pub fn has(&self, program: &str) -> bool {
        self.find(program).is_some()
    }

    /// Runs `program` to completion and returns its stdout. A non-zero exit is
    /// not an error; callers decide what an unsuccessful run means.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let resolved = self.find(program).ok_or_else(|| CommandError::NotFound {
            program: program.to_string(),
        })?;

        let child = Command::new(&resolved)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Wait {
                    program: program.to_string(),
                    source,
                })
            }
            Err(_elapsed) => {
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            debug!(program, status = %output.status, "command exited unsuccessfully");
        }

        Ok(CommandOutput {
            stdout: output.stdout,
            success: output.status.success(),
        })
    }
}

fn decode_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
