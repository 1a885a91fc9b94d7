use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::tool::{PackTool, ToolInvocation};
use crate::error::PackError;
use crate::runtime::Runtime;

pub const DEFAULT_OUTPUT_NAME: &str = "package.20.01.core.stream";
pub const DEFAULT_TOOL_ID: &str = "26";
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(2000);
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffOptions {
    pub tool_path: PathBuf,
    /// The tool runs here; the scratch directory is a child of it.
    pub work_root: PathBuf,
    pub output_name: String,
    pub tool_id: String,
    pub archive_out: PathBuf,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
}

impl HandoffOptions {
    pub fn new(tool_path: PathBuf, work_root: PathBuf, archive_out: PathBuf) -> Self {
        Self {
            tool_path,
            work_root,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            tool_id: DEFAULT_TOOL_ID.to_string(),
            archive_out,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Where the tool is told to write its artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.work_root.join(&self.output_name)
    }
}

/// Run the packaging tool over the staged scratch directory and install the
/// artifact it produces into the archive-output directory. Returns the
/// installed artifact path.
#[tracing::instrument(skip(runtime, tool))]
pub async fn handoff<R, T>(
    runtime: &R,
    tool: &T,
    options: &HandoffOptions,
) -> Result<PathBuf, PackError>
where
    R: Runtime,
    T: PackTool + ?Sized,
{
    if !runtime.is_file(&options.tool_path) {
        return Err(PackError::ToolMissing(options.tool_path.clone()));
    }

    let artifact = options.artifact_path();
    if runtime.exists(&artifact) {
        debug!("Removing stale artifact {:?}", artifact);
        runtime
            .remove_file(&artifact)
            .map_err(|e| PackError::StaleArtifact {
                path: artifact.clone(),
                reason: format!("{:#}", e),
            })?;
    }

    let invocation = ToolInvocation {
        program: options.tool_path.clone(),
        args: vec![
            artifact.to_string_lossy().into_owned(),
            options.tool_id.clone(),
        ],
        cwd: options.work_root.clone(),
    };
    info!("Running packaging tool {:?}", invocation.program);

    let output = tool.run(&invocation).await.map_err(|e| {
        let not_found = e
            .chain()
            .filter_map(|c| c.downcast_ref::<std::io::Error>())
            .any(|io| io.kind() == std::io::ErrorKind::NotFound);
        if not_found {
            PackError::ToolMissing(options.tool_path.clone())
        } else {
            PackError::ToolFailed {
                status: "not started".to_string(),
                stderr: format!("{:#}", e),
            }
        }
    })?;

    if !output.stdout.trim().is_empty() {
        info!("Packaging tool stdout:\n{}", output.stdout.trim_end());
    }
    if !output.stderr.trim().is_empty() {
        warn!("Packaging tool stderr:\n{}", output.stderr.trim_end());
    }
    if !output.success {
        return Err(PackError::ToolFailed {
            status: output.status_text(),
            stderr: output.stderr.trim().to_string(),
        });
    }

    wait_for_artifact(runtime, &artifact, options.poll_timeout, options.poll_interval).await?;

    let dest = options.archive_out.join(&options.output_name);
    install_artifact(runtime, &artifact, &options.archive_out, &dest)?;
    info!("Installed {:?}", dest);
    Ok(dest)
}

/// The tool may exit before its output is flushed to disk; give it a bounded
/// grace period.
async fn wait_for_artifact<R: Runtime>(
    runtime: &R,
    artifact: &Path,
    timeout: Duration,
    interval: Duration,
) -> Result<(), PackError> {
    let poll = async {
        while !runtime.is_file(artifact) {
            tokio::time::sleep(interval).await;
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| PackError::ArtifactNotProduced {
            path: artifact.to_path_buf(),
            waited: timeout,
        })
}

fn install_artifact<R: Runtime>(
    runtime: &R,
    artifact: &Path,
    archive_out: &Path,
    dest: &Path,
) -> Result<(), PackError> {
    let copy_failed = |e: anyhow::Error| PackError::ArtifactCopyFailed {
        from: artifact.to_path_buf(),
        to: dest.to_path_buf(),
        reason: format!("{:#}", e),
    };
    runtime.create_dir_all(archive_out).map_err(copy_failed)?;
    runtime.copy(artifact, dest).map_err(copy_failed)?;
    Ok(())
}
