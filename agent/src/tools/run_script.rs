//! `run_python_file`: execute a sandboxed script under the configured interpreter.

use std::process::Command;

use tracing::{info, warn};

use crate::io::config::ScriptConfig;
use crate::io::process::{ProcessOutcome, ProcessOutput, run_with_timeout};
use crate::io::sandbox::SandboxRoot;
use crate::tools::ToolError;

/// Run `path` with `args`, working directory set to the sandbox root.
///
/// A script that exits nonzero is still a successful tool run; only the
/// surrounding machinery (resolution, spawning, timeout) produces errors.
pub fn run_script(
    root: &SandboxRoot,
    script: &ScriptConfig,
    path: &str,
    args: &[String],
) -> Result<ProcessOutput, ToolError> {
    let target = root.resolve(path)?;
    if !target.exists() {
        return Err(ToolError::NotFound {
            path: path.to_string(),
        });
    }
    let extension_matches = target
        .extension()
        .is_some_and(|ext| ext == script.extension.as_str());
    if !extension_matches || !target.is_file() {
        return Err(ToolError::UnsupportedFileType {
            path: path.to_string(),
            expected: script.extension.clone(),
        });
    }

    let mut cmd = Command::new(&script.interpreter);
    cmd.arg(&target).args(args).current_dir(root.path());

    info!(path, args = args.len(), interpreter = %script.interpreter, "running script");
    let outcome = run_with_timeout(cmd, script.timeout(), script.output_limit_bytes)
        .map_err(|err| {
            ToolError::io(
                "Cannot execute",
                path,
                std::io::Error::other(format!("{err:#}")),
            )
        })?;

    match outcome {
        ProcessOutcome::Exited(output) => Ok(output),
        ProcessOutcome::TimedOut => {
            warn!(path, timeout_secs = script.timeout_secs, "script timed out");
            Err(ToolError::Timeout {
                path: path.to_string(),
                secs: script.timeout_secs,
            })
        }
    }
}
