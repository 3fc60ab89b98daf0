//! The linker driver (component C10): builds the `zig build-exe` command
//! line and invokes it as a blocking child process with a bounded
//! wall-clock timeout.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::ir::opt::OptimizeLevel;
use crate::target::Target;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target: Option<Target>,
    pub opt_level: OptimizeLevel,
    pub strip_symbols: bool,
    pub static_link: bool,
    pub timeout: Duration,
}

impl Config {
    pub fn from_config(
        target: Option<Target>,
        opt_level: OptimizeLevel,
        strip_symbols: bool,
        static_link: bool,
    ) -> Self {
        Config {
            target,
            opt_level,
            strip_symbols,
            static_link,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn optimize_flag(&self) -> &'static str {
        match self.opt_level {
            OptimizeLevel::None => "-ODebug",
            OptimizeLevel::Basic => "-OReleaseSafe",
            OptimizeLevel::Aggressive => "-OReleaseFast",
            OptimizeLevel::Size => "-OReleaseSmall",
        }
    }

    pub fn executable_extension(&self) -> &'static str {
        self.target.unwrap_or_else(Target::native).executable_extension()
    }

    /// Derive the output executable path: the input file's stem plus the
    /// target's executable extension, unless `override_path` replaces the
    /// stem entirely.
    pub fn generate_output_path(&self, source_path: &Path, override_path: Option<&Path>) -> PathBuf {
        if let Some(path) = override_path {
            return path.to_path_buf();
        }
        let stem = source_path.file_stem().unwrap_or_default();
        let mut path = PathBuf::from(stem);
        let ext = self.executable_extension();
        if !ext.is_empty() {
            path.set_extension(&ext[1..]); // drop the leading '.'
        }
        path
    }

    /// Build the exact `zig build-exe` argv for compiling `source_path` into
    /// `output_path`.
    pub fn build_command(&self, source_path: &Path, output_path: &Path) -> Vec<String> {
        let mut argv = vec!["zig".to_string(), "build-exe".to_string()];
        argv.push(source_path.display().to_string());

        if let Some(target) = self.target {
            argv.push("-target".to_string());
            argv.push(target.to_triple());
        }

        argv.push(self.optimize_flag().to_string());

        if self.strip_symbols {
            argv.push("-fstrip".to_string());
        }

        argv.push(format!("-femit-bin={}", output_path.display()));

        argv
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendInvocationFailed {
    #[error("unable to start \"zig build-exe\": {0}")]
    StartFailed(String),
    #[error("\"zig build-exe\" timed out after {0:?}")]
    TimedOut(Duration),
    #[error("\"zig build-exe\" exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
}

/// Invoke `zig build-exe` for `source_path`, producing `output_path`, and
/// block until it finishes or `config.timeout` elapses. On timeout the
/// child is killed before the error is returned.
pub fn invoke(
    config: &Config,
    source_path: &Path,
    output_path: &Path,
) -> Result<(), BackendInvocationFailed> {
    let argv = config.build_command(source_path, output_path);

    tracing::debug!(?argv, "invoking back-end");

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| BackendInvocationFailed::StartFailed(e.to_string()))?;

    wait_with_timeout(&mut child, config.timeout)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(), BackendInvocationFailed> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| BackendInvocationFailed::StartFailed(e.to_string()))?
        {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }

            return if status.success() {
                Ok(())
            } else {
                Err(BackendInvocationFailed::NonZeroExit {
                    status: status.code().unwrap_or(1),
                    stderr,
                })
            };
        }

        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendInvocationFailed::TimedOut(timeout));
        }

        std::thread::sleep(poll_interval);
    }
}

/// Forward a cancellation request to a still-running child, used by the
/// session's teardown path when a compilation is cancelled mid-link.
pub fn cancel(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use std::path::Path;

    #[test]
    fn builds_the_exact_argv_from_scenario_six() {
        let config = Config::from_config(
            Some(Target::from_string("x86_64-linux-gnu").unwrap()),
            OptimizeLevel::Aggressive,
            true,
            false,
        );
        let argv = config.build_command(Path::new("prog.zig"), Path::new("prog"));

        assert_eq!(argv[0], "zig");
        assert_eq!(argv[1], "build-exe");
        assert!(argv.contains(&"-target".to_string()));
        assert!(argv.contains(&"x86_64-linux-gnu".to_string()));
        assert!(argv.contains(&"-OReleaseFast".to_string()));
        assert!(argv.contains(&"-fstrip".to_string()));
        assert!(argv.iter().any(|a| a.starts_with("-femit-bin=")));
        assert_eq!(argv.iter().filter(|a| a.starts_with("-femit-bin=")).count(), 1);
    }

    #[test]
    fn output_path_uses_the_source_stem_by_default() {
        let config = Config::from_config(None, OptimizeLevel::Basic, false, false);
        let path = config.generate_output_path(Path::new("dir/prog.php"), None);
        assert_eq!(path, PathBuf::from("prog"));
    }

    #[test]
    fn output_path_override_replaces_the_stem_entirely() {
        let config = Config::from_config(None, OptimizeLevel::Basic, false, false);
        let path = config.generate_output_path(Path::new("dir/prog.php"), Some(Path::new("/tmp/out")));
        assert_eq!(path, PathBuf::from("/tmp/out"));
    }
}
