//! External command execution -- spawn, capture bounded output, enforce
//! timeouts.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::warn;

use super::{Job, JobOutput, JobStatus};
use crate::config::JobConfig;
use crate::error::SchedulerError;

const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Runs the configured external command with the inherited environment.
pub struct CommandJob {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    max_output_bytes: usize,
}

impl CommandJob {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Option<Duration>,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(cfg: &JobConfig) -> Self {
        Self::new(
            cfg.command.clone(),
            cfg.args.clone(),
            cfg.timeout_secs.map(Duration::from_secs),
            cfg.max_output_bytes,
        )
    }
}

#[async_trait::async_trait]
impl Job for CommandJob {
    async fn execute(&self) -> Result<JobOutput, SchedulerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // stdout and stderr interleave into one bounded buffer; the readers
        // keep draining past the cap so a chatty job never blocks on a full
        // pipe.
        let sink = Arc::new(Mutex::new(OutputBuf::new(self.max_output_bytes)));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(drain(stdout, Arc::clone(&sink))));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(drain(stderr, Arc::clone(&sink))));
        }

        let wait_result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await,
            None => Ok(child.wait().await),
        };
        let (status, timed_out) = match wait_result {
            Ok(status) => (Some(status?), false),
            Err(_elapsed) => {
                warn!(program = %self.program, "job exceeded timeout, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out job");
                }
                (None, true)
            }
        };

        for reader in readers {
            let _ = reader.await;
        }

        let (data, truncated) = {
            let mut sink = sink.lock().expect("output sink poisoned");
            sink.take()
        };
        let mut excerpt = String::from_utf8_lossy(&data).into_owned();
        if truncated {
            excerpt.push_str(TRUNCATION_MARKER);
        }

        let (job_status, exit_code) = if timed_out {
            (JobStatus::TimedOut, None)
        } else {
            match status {
                Some(s) if s.success() => (JobStatus::Succeeded, s.code()),
                Some(s) => (JobStatus::Failed, s.code()),
                None => (JobStatus::Failed, None),
            }
        };

        Ok(JobOutput {
            status: job_status,
            exit_code,
            excerpt,
            truncated,
        })
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Combined output buffer with a hard cap.
struct OutputBuf {
    data: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl OutputBuf {
    fn new(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.data.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn take(&mut self) -> (Vec<u8>, bool) {
        (std::mem::take(&mut self.data), self.truncated)
    }
}

async fn drain<R>(mut reader: R, sink: Arc<Mutex<OutputBuf>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink
                .lock()
                .expect("output sink poisoned")
                .push(&chunk[..n]),
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>, cap: usize) -> CommandJob {
        CommandJob::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            timeout,
            cap,
        )
    }

    #[tokio::test]
    async fn test_successful_command_captures_output() {
        let out = sh("echo hello", None, 8192).execute().await.unwrap();
        assert_eq!(out.status, JobStatus::Succeeded);
        assert_eq!(out.exit_code, Some(0));
        assert!(out.excerpt.contains("hello"));
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_code() {
        let out = sh("exit 7", None, 8192).execute().await.unwrap();
        assert_eq!(out.status, JobStatus::Failed);
        assert_eq!(out.exit_code, Some(7));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let out = sh("echo oops >&2; exit 1", None, 8192)
            .execute()
            .await
            .unwrap();
        assert_eq!(out.status, JobStatus::Failed);
        assert!(out.excerpt.contains("oops"));
    }

    #[tokio::test]
    async fn test_timeout_kills_job() {
        let start = std::time::Instant::now();
        let out = sh("sleep 30", Some(Duration::from_millis(200)), 8192)
            .execute()
            .await
            .unwrap();
        assert_eq!(out.status, JobStatus::TimedOut);
        assert_eq!(out.exit_code, None);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_output_is_bounded() {
        let out = sh("head -c 65536 /dev/zero | tr '\\0' 'x'", None, 1024)
            .execute()
            .await
            .unwrap();
        assert!(out.truncated);
        assert!(out.excerpt.ends_with(TRUNCATION_MARKER));
        assert!(out.excerpt.len() <= 1024 + TRUNCATION_MARKER.len());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let job = CommandJob::new("/nonexistent/program", Vec::new(), None, 8192);
        assert!(job.execute().await.is_err());
    }

    #[test]
    fn test_describe_joins_args() {
        let job = sh("echo", None, 8192);
        assert_eq!(job.describe(), "/bin/sh -c echo");
    }
}
