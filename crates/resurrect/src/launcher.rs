//! OS process launching for the three trigger strategies.
//!
//! [`plan`] turns a trigger plus the effective environment into a
//! [`LaunchPlan`]; a [`ProcessLauncher`] carries it out. [`OsLauncher`] is
//! the real implementation, tests substitute a recording one.

use std::fs::OpenOptions;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use nix::sys::signal::kill;
use nix::unistd::{fork, ForkResult, Pid};
use resurrect_core::{Env, ProcessId, ResurrectError, Result};
use tracing::{debug, error, info};

use crate::trigger::{ReadinessCheck, Trigger};

pub use nix::sys::signal::Signal;

/// Shell used for one-shot triggers.
const SHELL: &str = "/bin/sh";
/// Periodic-execution wrapper used for interval triggers.
const WATCH: &str = "watch";

/// A fully resolved description of the process to spawn.
#[derive(Debug, Clone)]
pub enum LaunchPlan {
    /// Exec `program` with `args`; the child's environment is exactly `env`.
    Command {
        program: String,
        args: Vec<String>,
        env: Env,
    },
    /// Fork, install `env`, run `check`, then touch `marker` on success.
    Check {
        check: ReadinessCheck,
        marker: PathBuf,
        env: Env,
    },
}

impl LaunchPlan {
    pub fn env(&self) -> &Env {
        match self {
            LaunchPlan::Command { env, .. } | LaunchPlan::Check { env, .. } => env,
        }
    }
}

/// Build the launch plan for `trigger` re-invoking `dispatch`.
pub fn plan(trigger: &Trigger, dispatch: &Path, env: Env) -> LaunchPlan {
    let entrypoint = shell_quote(&dispatch.to_string_lossy());
    match trigger {
        Trigger::Check(check) => LaunchPlan::Check {
            check: check.clone(),
            marker: dispatch.to_path_buf(),
            env,
        },
        // watch hands its command to `sh -c`, hence the quoting.
        Trigger::Every(interval) => LaunchPlan::Command {
            program: WATCH.to_string(),
            args: vec!["-n".to_string(), interval.as_secs().to_string(), entrypoint],
            env,
        },
        Trigger::Oneshot(delay) => LaunchPlan::Command {
            program: SHELL.to_string(),
            args: vec![
                "-c".to_string(),
                format!("sleep {}; {}", delay.as_secs(), entrypoint),
            ],
            env,
        },
    }
}

/// Spawns re-dispatch processes and signals them.
pub trait ProcessLauncher: Send + Sync {
    /// Start the process described by `plan` without waiting for it.
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessId>;

    /// Deliver `signal` to `pid`. Does not wait for the process to exit.
    fn signal(&self, pid: ProcessId, signal: Signal) -> Result<()>;
}

/// Launches real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLauncher;

impl ProcessLauncher for OsLauncher {
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessId> {
        match plan {
            LaunchPlan::Command { program, args, env } => spawn_command(program, args, env),
            LaunchPlan::Check { check, marker, env } => fork_check(check, marker, env),
        }
    }

    fn signal(&self, pid: ProcessId, signal: Signal) -> Result<()> {
        let raw = pid.as_raw();
        // kill(2) treats 0 and negative pids as process groups.
        let target = i32::try_from(raw)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| ResurrectError::Signal {
                pid: raw,
                reason: "not a single-process pid".to_string(),
            })?;

        kill(Pid::from_raw(target), signal).map_err(|e| ResurrectError::Signal {
            pid: raw,
            reason: e.to_string(),
        })?;
        debug!(pid = raw, %signal, "signal delivered");
        Ok(())
    }
}

fn spawn_command(program: &str, args: &[String], env: &Env) -> Result<ProcessId> {
    debug!(program, ?args, "spawning re-dispatch command");
    // The child is not waited on; it outlives this hook invocation.
    let child = Command::new(program)
        .args(args)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| ResurrectError::Spawn(format!("{program}: {e}")))?;
    Ok(ProcessId(child.id()))
}

fn fork_check(check: &ReadinessCheck, marker: &Path, env: &Env) -> Result<ProcessId> {
    debug!(check = check.name(), marker = %marker.display(), "forking readiness check");

    // SAFETY: the child never returns into the caller's frames. It runs the
    // check with panics contained, then leaves through `_exit`.
    match unsafe { fork() }.map_err(|e| ResurrectError::Spawn(format!("fork: {e}")))? {
        ForkResult::Parent { child } => Ok(ProcessId(child.as_raw() as u32)),
        ForkResult::Child => {
            let code = catch_unwind(AssertUnwindSafe(|| run_check_child(check, marker, env)))
                .unwrap_or(101);
            // SAFETY: terminating the forked child without running the
            // parent's atexit handlers or destructors.
            unsafe { libc::_exit(code) }
        }
    }
}

/// Body of the forked readiness child. Returns the exit code.
fn run_check_child(check: &ReadinessCheck, marker: &Path, env: &Env) -> i32 {
    replace_process_env(env);

    if let Err(e) = check.run() {
        error!(check = check.name(), "readiness check failed: {e}");
        return 1;
    }

    match touch(marker) {
        Ok(()) => {
            info!(check = check.name(), marker = %marker.display(), "readiness reached");
            0
        }
        Err(e) => {
            error!(marker = %marker.display(), "touch failed: {e}");
            2
        }
    }
}

/// Make `env` the whole process environment.
fn replace_process_env(env: &Env) {
    let current: Vec<_> = std::env::vars_os().map(|(k, _)| k).collect();
    for key in current {
        std::env::remove_var(key);
    }
    for (k, v) in env {
        std::env::set_var(k, v);
    }
}

/// Create `path` if missing and bump its modification time.
pub(crate) fn touch(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())?;
    Ok(())
}

/// Quote `s` for POSIX `sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
