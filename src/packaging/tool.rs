use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::PathBuf;

/// One run of the external packaging executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// What the executable left behind once it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackTool: Send + Sync {
    /// Run the tool to completion and capture its output. An `Err` means the
    /// process could not be started at all.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Spawns the packaging executable as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPackTool;

#[async_trait]
impl PackTool for ProcessPackTool {
    #[tracing::instrument(skip(self))]
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        debug!(
            "Running {:?} {:?} in {:?}",
            invocation.program, invocation.args, invocation.cwd
        );
        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {:?}", invocation.program))?;

        Ok(ToolOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
