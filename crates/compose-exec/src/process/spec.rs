use std::{
    ffi::{OsStr, OsString},
    fmt,
    sync::Arc,
    time::Duration,
};

use tracing::trace;

use crate::{ExecError, StderrPolicy};

/// Everything needed to launch one child process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Caller context attached to every output line (repository name).
    pub(crate) context: Arc<str>,
    /// Short tool label for logs (e.g. `"appstream-builder"`, `"tar"`).
    pub(crate) tool: Arc<str>,
    /// Program to execute, resolved through `PATH` when not absolute.
    pub(crate) command: String,
    pub(crate) args: Vec<OsString>,
    pub(crate) stderr: StderrPolicy,
    /// Bounded wait before the child is killed. `None` waits forever.
    pub(crate) timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(
        context: impl Into<Arc<str>>,
        tool: impl Into<Arc<str>>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            tool: tool.into(),
            command: command.into(),
            args: Vec::new(),
            stderr: StderrPolicy::default(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn stderr(mut self, policy: StderrPolicy) -> Self {
        self.stderr = policy;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn stderr_policy(&self) -> StderrPolicy {
        self.stderr
    }

    /// Rules:
    /// - `command` is not empty or whitespace-only;
    /// - a configured timeout is non-zero.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.command.trim().is_empty() {
            return Err(ExecError::InvalidSpec(format!(
                "empty command for tool '{}'",
                self.tool
            )));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecError::InvalidSpec("timeout must be non-zero".into()));
        }
        Ok(())
    }

    pub fn trace_state(&self) {
        trace!(
            repo = %self.context,
            tool = %self.tool,
            command = %self.command,
            args = ?self.args,
            stderr = ?self.stderr,
            timeout = ?self.timeout,
            "process spec resolved"
        );
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProcessSpec(tool='{}', cmd='{}', args={})",
            self.tool,
            self.command,
            self.args.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    #[test]
    fn builder_collects_arguments_in_order() {
        let spec = ProcessSpec::new("repoA", "tar", "tar")
            .arg("-C")
            .args(["/x", "-czf"])
            .stderr(StderrPolicy::Uniform(Severity::Error));

        assert_eq!(spec.command(), "tar");
        assert_eq!(spec.arguments(), &["-C", "/x", "-czf"].map(OsString::from));
        assert_eq!(spec.stderr_policy(), StderrPolicy::Uniform(Severity::Error));
        assert_eq!(
            spec.to_string(),
            "ProcessSpec(tool='tar', cmd='tar', args=3)"
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        let spec = ProcessSpec::new("repoA", "builder", "   ");
        assert!(matches!(spec.validate(), Err(ExecError::InvalidSpec(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let spec = ProcessSpec::new("repoA", "sh", "sh").timeout(Some(Duration::ZERO));
        assert!(spec.validate().is_err());
        let spec = ProcessSpec::new("repoA", "sh", "sh").timeout(Some(Duration::from_secs(1)));
        assert!(spec.validate().is_ok());
    }
}
