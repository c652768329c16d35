use std::{
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    task::JoinHandle,
};
use tracing::{debug, instrument, warn};

use crate::{
    ExecError, LineBuffer, LineSink, LogLine, ProcessSpec, SeverityRules, StderrPolicy, Stream,
};

const READ_CHUNK: usize = 4096;

/// How long output readers may keep running after a failed or killed child.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of a child that ran to completion.
///
/// A non-zero exit is not an error at this level; the caller decides whether
/// it is fatal for its stage.
#[derive(Debug, Clone)]
pub struct ExitReport {
    pub status: ExitStatus,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
    pub elapsed: Duration,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` when terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn describe(&self) -> String {
        match self.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs child processes and streams their output into a [`LineSink`].
#[derive(Clone)]
pub struct ProcessSupervisor {
    sink: Arc<dyn LineSink>,
    rules: Arc<SeverityRules>,
}

impl ProcessSupervisor {
    /// Supervisor with the standard marker rules.
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self::with_rules(sink, SeverityRules::standard())
    }

    pub fn with_rules(sink: Arc<dyn LineSink>, rules: SeverityRules) -> Self {
        Self {
            sink,
            rules: Arc::new(rules),
        }
    }

    /// Run `spec` to completion.
    ///
    /// Both pipes are drained by their own task while the child runs; the call
    /// returns only after the child has exited AND both readers have reached
    /// end of stream, so no output is delivered after the reported exit.
    ///
    /// With a timeout the child leads its own process group, and the whole
    /// group is killed on expiry. After a kill or a failed wait the readers get
    /// a short grace period and are then abandoned.
    ///
    /// Failing to start the child is an error; a non-zero exit is not.
    #[instrument(level = "debug", skip(self, spec), fields(repo = %spec.context, tool = %spec.tool))]
    pub async fn run(&self, spec: &ProcessSpec) -> Result<ExitReport, ExecError> {
        spec.validate()?;
        spec.trace_state();

        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if spec.timeout.is_some() {
            // Own group, so a timeout can kill shells together with their children.
            cmd.process_group(0);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: spec.command.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(pid, "child started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Internal("stdout pipe missing".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Internal("stderr pipe missing".into()))?;

        let mut stdout_task =
            self.spawn_reader(stdout, Stream::Stdout, spec, StderrPolicy::Classify);
        let mut stderr_task = self.spawn_reader(stderr, Stream::Stderr, spec, spec.stderr);

        let waited = match spec.timeout {
            None => child.wait().await.map_err(ExecError::Wait),
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(res) => res.map_err(ExecError::Wait),
                Err(_) => {
                    warn!(timeout = ?limit, "child exceeded its time limit; killing");
                    if let Some(pid) = pid {
                        if let Err(e) = kill_group(pid) {
                            warn!(pid, "failed to kill process group: {e}");
                        }
                    }
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill child: {e}");
                    }
                    Err(ExecError::Timeout {
                        command: spec.command.clone(),
                        after: limit,
                    })
                }
            },
        };

        let status = match waited {
            Ok(status) => status,
            Err(e) => {
                // Output readers get a bounded grace period once the child is gone.
                let drained = tokio::time::timeout(DRAIN_GRACE, async {
                    tokio::join!(&mut stdout_task, &mut stderr_task)
                })
                .await;
                if drained.is_err() {
                    warn!(grace = ?DRAIN_GRACE, "output pipes still open; abandoning readers");
                    stdout_task.abort();
                    stderr_task.abort();
                }
                return Err(e);
            }
        };

        let (stdout_lines, stderr_lines) = tokio::join!(stdout_task, stderr_task);
        let stdout_lines = joined(stdout_lines)?;
        let stderr_lines = joined(stderr_lines)?;

        let report = ExitReport {
            status,
            stdout_lines,
            stderr_lines,
            elapsed: started.elapsed(),
        };
        debug!(
            status = %report.describe(),
            stdout_lines,
            stderr_lines,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "child exited"
        );
        Ok(report)
    }

    fn spawn_reader<R>(
        &self,
        reader: R,
        stream: Stream,
        spec: &ProcessSpec,
        policy: StderrPolicy,
    ) -> JoinHandle<std::io::Result<usize>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let forward = Forwarder {
            sink: Arc::clone(&self.sink),
            rules: Arc::clone(&self.rules),
            context: Arc::clone(&spec.context),
            tool: Arc::clone(&spec.tool),
            stream,
            policy,
        };
        tokio::spawn(drain(reader, forward))
    }
}

/// Sends SIGKILL to the process group led by `pid`.
fn kill_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::other(format!("pid {pid} out of range")))?;
    // SAFETY: kill(2) with a negative pid only signals that group; no memory is touched.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn joined(
    res: Result<std::io::Result<usize>, tokio::task::JoinError>,
) -> Result<usize, ExecError> {
    res.map_err(|e| ExecError::Internal(format!("stream reader aborted: {e}")))?
        .map_err(ExecError::Io)
}

/// Per-stream state shared by nothing else.
struct Forwarder {
    sink: Arc<dyn LineSink>,
    rules: Arc<SeverityRules>,
    context: Arc<str>,
    tool: Arc<str>,
    stream: Stream,
    policy: StderrPolicy,
}

impl Forwarder {
    fn forward(&self, text: String) {
        let severity = self.policy.resolve(&self.rules, &text);
        self.sink.emit(LogLine {
            context: Arc::clone(&self.context),
            tool: Arc::clone(&self.tool),
            stream: self.stream,
            severity,
            text,
        });
    }
}

async fn drain<R>(mut reader: R, fwd: Forwarder) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut buf = LineBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut lines = 0usize;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.feed(&chunk[..n], |text| {
            lines += 1;
            fwd.forward(text);
        });
    }
    buf.finish(|text| {
        lines += 1;
        fwd.forward(text);
    });
    Ok(lines)
}
