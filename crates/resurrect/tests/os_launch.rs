// End-to-end runs against real processes. Serialised because they mutate
// process environment variables and fork.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use resurrect::{
    Env, ProcessId, ReadinessCheck, Resurrect, ResurrectError, ResurrectOptions, Signal, Trigger,
    DEFAULT_STOP_SIGNAL,
};
use resurrect_store::{SqliteStore, StateStore};
use serial_test::serial;

/// Writes its environment to `$RESURRECT_TEST_OUT`, atomically.
const DISPATCH_SCRIPT: &str = "#!/bin/sh\nenv > \"$RESURRECT_TEST_OUT.tmp\" && mv \"$RESURRECT_TEST_OUT.tmp\" \"$RESURRECT_TEST_OUT\"\n";

fn charm_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let dispatch = dir.path().join("dispatch");
    fs::write(&dispatch, DISPATCH_SCRIPT).unwrap();
    fs::set_permissions(&dispatch, fs::Permissions::from_mode(0o755)).unwrap();
    dir
}

fn store(dir: &Path) -> Arc<dyn StateStore> {
    Arc::new(SqliteStore::open(dir.join("state.db")).unwrap())
}

fn wait_for(path: &Path, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn env_of(pairs: &[(&str, &str)]) -> Env {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn reap(pid: ProcessId) -> WaitStatus {
    waitpid(Pid::from_raw(pid.as_raw() as i32), None).unwrap()
}

#[test]
#[serial]
fn oneshot_redispatches_with_primed_env() {
    let charm = charm_dir();
    let out = charm.path().join("dispatched.env");
    std::env::set_var("JUJU_CHARM_DIR", charm.path());

    let r = Resurrect::new(
        Trigger::oneshot(Duration::from_secs(1)).unwrap(),
        ResurrectOptions::default(),
        store(charm.path()),
    )
    .unwrap();
    r.prime(env_of(&[
        ("CUSTOM_ENV_VAR", "foo"),
        ("RESURRECT_TEST_OUT", out.to_str().unwrap()),
    ]))
    .unwrap();
    let pid = r.start(None).unwrap();
    std::env::remove_var("JUJU_CHARM_DIR");

    assert!(wait_for(&out, Duration::from_secs(15)), "dispatch never ran");
    let dumped = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = dumped.lines().collect();
    assert!(lines.contains(&"CUSTOM_ENV_VAR=foo"));
    assert!(lines.contains(&"JUJU_DISPATCH_PATH=hooks/resurrect"));
    assert!(lines.contains(&"OPERATOR_DISPATCH=1"));

    assert!(matches!(reap(pid), WaitStatus::Exited(_, 0)));
    // One-shot runs are not re-armed; the pid stays recorded until stop.
    assert_eq!(r.pid().unwrap(), Some(pid));
}

#[test]
#[serial]
fn stop_kills_pending_oneshot() {
    let charm = charm_dir();
    let out = charm.path().join("never.env");

    let r = Resurrect::new(
        Trigger::oneshot(Duration::from_secs(30)).unwrap(),
        ResurrectOptions {
            charm_dir: Some(charm.path().to_path_buf()),
            ..ResurrectOptions::default()
        },
        store(charm.path()),
    )
    .unwrap();
    r.prime(env_of(&[("RESURRECT_TEST_OUT", out.to_str().unwrap())]))
        .unwrap();
    let pid = r.start(None).unwrap();
    assert!(r.is_started().unwrap());

    r.stop(None, DEFAULT_STOP_SIGNAL).unwrap();

    assert!(!r.is_started().unwrap());
    assert!(matches!(reap(pid), WaitStatus::Signaled(_, Signal::SIGKILL, _)));
    assert!(!out.exists());
}

#[test]
#[serial]
fn stop_of_missing_process_reports_but_forgets() {
    let charm = charm_dir();
    let r = Resurrect::new(
        Trigger::every(Duration::from_secs(10)).unwrap(),
        ResurrectOptions {
            charm_dir: Some(charm.path().to_path_buf()),
            ..ResurrectOptions::default()
        },
        store(charm.path()),
    )
    .unwrap();

    // Far above any real pid_max.
    let err = r
        .stop(Some(ProcessId(0x7fff_fff0)), DEFAULT_STOP_SIGNAL)
        .unwrap_err();
    assert!(matches!(err, ResurrectError::Signal { .. }));
    assert!(!r.is_started().unwrap());
}

#[test]
#[serial]
fn start_without_charm_dir_fails() {
    std::env::remove_var("JUJU_CHARM_DIR");
    let dir = tempfile::tempdir().unwrap();
    let r = Resurrect::new(
        Trigger::oneshot(Duration::from_secs(1)).unwrap(),
        ResurrectOptions::default(),
        store(dir.path()),
    )
    .unwrap();

    let err = r.start(None).unwrap_err();
    assert!(matches!(err, ResurrectError::MissingEnv { ref var } if var == "JUJU_CHARM_DIR"));
    assert!(!r.is_started().unwrap());
}

#[test]
#[serial]
fn readiness_check_touches_dispatch_when_ready() {
    let charm = tempfile::tempdir().unwrap();
    let dispatch = charm.path().join("dispatch");
    let flag: PathBuf = charm.path().join("ready.flag");

    let watched = flag.clone();
    let check = ReadinessCheck::new("flag-file", move || {
        // Runs in the forked child with only the primed environment.
        if std::env::var("CUSTOM_ENV_VAR").as_deref() != Ok("foo") {
            return Err("primed environment not installed".into());
        }
        let deadline = Instant::now() + Duration::from_secs(30);
        while !watched.exists() {
            if Instant::now() > deadline {
                return Err("flag never appeared".into());
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    });

    let r = Resurrect::new(
        Trigger::Check(check),
        ResurrectOptions {
            charm_dir: Some(charm.path().to_path_buf()),
            ..ResurrectOptions::default()
        },
        store(charm.path()),
    )
    .unwrap();
    r.prime_with(
        env_of(&[("CUSTOM_ENV_VAR", "foo")]),
        resurrect::PrimeOptions {
            use_process_env: false,
            ..Default::default()
        },
    )
    .unwrap();

    let pid = r.start(None).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(!dispatch.exists(), "touched before the check passed");

    fs::write(&flag, b"").unwrap();

    assert!(wait_for(&dispatch, Duration::from_secs(15)), "dispatch never touched");
    assert!(matches!(reap(pid), WaitStatus::Exited(_, 0)));
    // The parent's environment is untouched by the child.
    assert!(std::env::var("CUSTOM_ENV_VAR").is_err());
}
