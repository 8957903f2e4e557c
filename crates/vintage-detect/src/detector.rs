use std::path::{Path, PathBuf};
use std::time::Duration;

use vintage_process::{run_command, CommandSpec, RunOptions};

use crate::tree::{detect_tree, DetectOptions, Detection};

#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to run detector: {0}")]
    Spawn(String),
    #[error("detector timed out after {0:?}")]
    TimedOut(Duration),
    #[error("detector failed without a report: {0}")]
    Failed(String),
    #[error("detector panicked: {0}")]
    Panicked(String),
}

/// Produces the raw report text for one source file.
///
/// Implementations are shared by reference across worker threads and must
/// not keep per-call mutable state.
pub trait Detector: Send + Sync {
    fn detect(&self, path: &Path) -> Result<String, DetectorError>;

    /// Every source file under `root`; see [`detect_tree`].
    fn detect_all(&self, root: &Path, options: &DetectOptions) -> Detection {
        detect_tree(root, self, options)
    }
}

/// Runs an external detector program once per file.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
    options: RunOptions,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, options: RunOptions) -> Self {
        Self {
            program: program.into(),
            args,
            options,
        }
    }
}

impl Detector for CommandDetector {
    fn detect(&self, path: &Path) -> Result<String, DetectorError> {
        let mut args = self.args.clone();
        args.push(path.to_string_lossy().into_owned());
        let command = CommandSpec::new(Path::new("."), &self.program, &args);

        let result = run_command(&command, &self.options)
            .map_err(|err| DetectorError::Spawn(format!("`{command}`: {err}")))?;

        if result.timed_out {
            return Err(DetectorError::TimedOut(
                self.options.timeout.unwrap_or_default(),
            ));
        }
        if result.output.truncated {
            tracing::warn!(
                target: "vintage.detect",
                path = %path.display(),
                max_bytes = self.options.max_bytes,
                "detector output truncated"
            );
        }
        // A failing exit that still printed a report is kept.
        if !result.status.success() && result.output.stdout.trim().is_empty() {
            let stderr = result.output.stderr.trim();
            let detail = stderr.lines().last().unwrap_or("no output");
            return Err(DetectorError::Failed(format!("{}: {detail}", result.status)));
        }

        Ok(result.output.stdout)
    }
}
