//! Running the external feature detector as a child process.
//!
//! The detector prints one report per file, but some inputs make it dump the
//! whole syntax tree, so output capture is bounded per stream. An optional
//! wall-clock timeout kills the child's whole process group; without one a
//! hung detector blocks its worker until it exits.

use std::{
    fmt,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

/// Captured stdout/stderr, each truncated to `RunOptions::max_bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream produced more bytes than were kept.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Kill the process group once this much wall-clock time has passed.
    pub timeout: Option<Duration>,
    /// Maximum bytes kept *per stream*.
    pub max_bytes: usize,
    /// Delay between SIGTERM and SIGKILL when a timeout fires.
    pub kill_grace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_bytes: 8 * 1024 * 1024,
            kill_grace: Duration::from_millis(250),
        }
    }
}

/// A full command invocation (cwd + program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(cwd: &Path, program: &Path, args: &[String]) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            program: program.to_path_buf(),
            args: args.to_vec(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('\t') {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub output: BoundedOutput,
    pub timed_out: bool,
}

/// Run `command` with bounded output capture. The exit status is always
/// returned; a timeout kills the child and sets `timed_out`.
pub fn run_command(command: &CommandSpec, opts: &RunOptions) -> io::Result<CommandResult> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so a timeout also reaches grandchildren that would
    // otherwise keep the pipes open.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;

        cmd.pre_exec(|| {
            // SAFETY: `setpgid` is async-signal-safe and does not allocate.
            if libc::setpgid(0, 0) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn()?;

    let Some(stdout) = child.stdout.take() else {
        return Err(io::Error::other("child stdout was not captured"));
    };
    let Some(stderr) = child.stderr.take() else {
        return Err(io::Error::other("child stderr was not captured"));
    };

    let max_bytes = opts.max_bytes;
    let stdout_handle = thread::spawn(move || read_bounded(stdout, max_bytes));
    let stderr_handle = thread::spawn(move || read_bounded(stderr, max_bytes));

    let mut timed_out = false;
    let status = match opts.timeout {
        Some(timeout) => {
            let start = Instant::now();
            let poll = Duration::from_millis(20);
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if start.elapsed() >= timeout {
                    tracing::debug!(
                        target: "vintage.process",
                        command = %command,
                        timeout_ms = timeout.as_millis() as u64,
                        "command timed out; terminating process group"
                    );
                    timed_out = true;
                    break terminate_process_group(&mut child, opts.kill_grace)?;
                }
                thread::sleep(poll.min(timeout.saturating_sub(start.elapsed())));
            }
        }
        None => child.wait()?,
    };

    let (stdout_bytes, stdout_truncated) = join_reader(stdout_handle, "stdout")??;
    let (stderr_bytes, stderr_truncated) = join_reader(stderr_handle, "stderr")??;

    Ok(CommandResult {
        status,
        output: BoundedOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            truncated: stdout_truncated || stderr_truncated,
        },
        timed_out,
    })
}

fn terminate_process_group(
    child: &mut std::process::Child,
    grace: Duration,
) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        let pid = child.id() as i32;
        // Negative pid addresses the group created by `setpgid(0, 0)`.
        unsafe {
            let _ = libc::kill(-pid, libc::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(25));
        }

        unsafe {
            let _ = libc::kill(-pid, libc::SIGKILL);
        }
        child.wait()
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        let _ = child.kill();
        child.wait()
    }
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<(Vec<u8>, bool)>>,
    stream: &'static str,
) -> io::Result<io::Result<(Vec<u8>, bool)>> {
    handle
        .join()
        .map_err(|_| io::Error::other(format!("{stream} reader thread panicked")))
}

fn read_bounded(mut reader: impl Read, max_bytes: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8 * 1024];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        // Keep draining after the cap so the child never blocks on a full pipe.
        let remaining = max_bytes.saturating_sub(out.len());
        let keep = remaining.min(n);
        out.extend_from_slice(&buf[..keep]);
        if keep < n {
            truncated = true;
        }
    }

    Ok((out, truncated))
}
