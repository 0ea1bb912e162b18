//! External image transform invocation.

use crate::pipeline::PipelineError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default program used to produce variants (ImageMagick).
pub const DEFAULT_PROGRAM: &str = "convert";

/// Poll interval while waiting for the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Something that turns a source file into a derived file.
///
/// The call is synchronous: it returns once `dest` is fully written or the
/// transform has failed.
pub trait Transform: Send + Sync {
    fn run(&self, source: &Path, params: &[String], dest: &Path) -> Result<(), PipelineError>;
}

/// Runs a command-line tool as `<program> <source> <params...> <dest>`.
#[derive(Debug, Clone)]
pub struct ConvertCommand {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ConvertCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the tool if it runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ConvertCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Transform for ConvertCommand {
    fn run(&self, source: &Path, params: &[String], dest: &Path) -> Result<(), PipelineError> {
        let program = self.program.display().to_string();
        log::debug!(
            "Running {} {} {} {}",
            program,
            source.display(),
            params.join(" "),
            dest.display()
        );

        let mut child = Command::new(&self.program)
            .arg(source)
            .args(params)
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Transform {
                program: program.clone(),
                status: "failed to start".to_string(),
                stderr: e.to_string(),
            })?;

        // Drain stderr on a separate thread so a chatty tool cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    return Err(PipelineError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    });
                }
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    log::warn!("{} exceeded {:?}, killing it", program, limit);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PipelineError::Timeout { program, limit });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(PipelineError::Transform {
                program,
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !stderr.trim().is_empty() {
            log::debug!("{} diagnostics: {}", program, stderr.trim());
        }
        Ok(())
    }
}
