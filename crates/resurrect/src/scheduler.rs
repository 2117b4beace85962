use std::path::PathBuf;
use std::sync::Arc;

use resurrect_core::config::{
    ResurrectConfig, DEFAULT_KEY, DISPATCH_FILE, JUJU_CHARM_DIR, JUJU_DISPATCH_PATH,
    OPERATOR_DISPATCH,
};
use resurrect_core::types::hook_path;
use resurrect_core::{Env, ProcessId, ResurrectError, Result};
use resurrect_hooks::{Dispatcher, HookHandler};
use resurrect_store::StateStore;
use tracing::{debug, info, warn};

use crate::launcher::{self, OsLauncher, ProcessLauncher, Signal};
use crate::state::{ResurrectState, StateSlot};
use crate::trigger::{ReadinessCheck, Trigger};

/// Signal `stop` sends unless told otherwise.
pub const DEFAULT_STOP_SIGNAL: Signal = Signal::SIGKILL;

/// Immutable per-scheduler settings.
#[derive(Debug, Clone)]
pub struct ResurrectOptions {
    /// State slot name and self-dispatch hook name.
    pub key: String,
    /// Start without warning when no environment was primed.
    pub allow_empty_env: bool,
    /// Overrides `$JUJU_CHARM_DIR` when locating `dispatch`.
    pub charm_dir: Option<PathBuf>,
}

impl Default for ResurrectOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            allow_empty_env: false,
            charm_dir: None,
        }
    }
}

impl From<&ResurrectConfig> for ResurrectOptions {
    fn from(config: &ResurrectConfig) -> Self {
        Self {
            key: config.key.clone(),
            allow_empty_env: config.allow_empty_env,
            charm_dir: config.charm_dir.clone(),
        }
    }
}

/// Flags for [`Resurrect::prime_with`].
#[derive(Debug, Clone, Copy)]
pub struct PrimeOptions {
    /// Replace an existing snapshot without warning.
    pub overwrite: bool,
    /// Start from the current process environment rather than an empty one.
    pub use_process_env: bool,
}

impl Default for PrimeOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            use_process_env: true,
        }
    }
}

/// Schedules re-invocations of the charm's own dispatch entrypoint.
///
/// All state lives in the injected [`StateStore`]; the struct itself is
/// rebuilt on every hook invocation.
pub struct Resurrect {
    trigger: Trigger,
    options: ResurrectOptions,
    state: StateSlot,
    launcher: Arc<dyn ProcessLauncher>,
}

impl Resurrect {
    /// Attach a scheduler to `store`, creating default state on first use.
    pub fn new(
        trigger: Trigger,
        options: ResurrectOptions,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        Self::with_launcher(trigger, options, store, Arc::new(OsLauncher))
    }

    pub fn with_launcher(
        trigger: Trigger,
        options: ResurrectOptions,
        store: Arc<dyn StateStore>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self> {
        trigger.validate()?;
        if options.key.is_empty() {
            return Err(ResurrectError::Config("key must not be empty".to_string()));
        }

        let state = StateSlot::new(store, options.key.clone());
        state.set_default()?;

        debug!(key = %options.key, trigger = trigger.kind(), "resurrect attached");
        Ok(Self {
            trigger,
            options,
            state,
            launcher,
        })
    }

    /// Build from loaded config. `check` and `config.trigger` are mutually
    /// exclusive and one of them must be present.
    pub fn from_config(
        config: &ResurrectConfig,
        check: Option<ReadinessCheck>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let trigger = match (check, &config.trigger) {
            (Some(_), Some(_)) => {
                return Err(ResurrectError::Config(
                    "a readiness check cannot be combined with a configured trigger".to_string(),
                ))
            }
            (Some(check), None) => Trigger::Check(check),
            (None, Some(timer)) => Trigger::try_from(timer)?,
            (None, None) => Trigger::from_parts(None, None, None)?,
        };
        Self::new(trigger, ResurrectOptions::from(config), store)
    }

    pub fn key(&self) -> &str {
        &self.options.key
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Hook name the completion is delivered under.
    pub fn trigger_hook(&self) -> &str {
        &self.options.key
    }

    /// Dispatch path written into the spawned environment, e.g. `hooks/resurrect`.
    pub fn hook_path(&self) -> String {
        hook_path(&self.options.key)
    }

    /// Subscribe `handler` to this scheduler's completion.
    pub fn observe_trigger(&self, dispatcher: &Dispatcher, handler: impl HookHandler + 'static) {
        dispatcher.observe(self.trigger_hook(), handler);
    }

    /// Snapshot of the persisted state.
    pub fn state(&self) -> Result<ResurrectState> {
        self.state.load()
    }

    /// The outstanding re-dispatch process, if any.
    pub fn pid(&self) -> Result<Option<ProcessId>> {
        Ok(self.state.load()?.pid)
    }

    pub fn is_started(&self) -> Result<bool> {
        Ok(self.pid()?.is_some())
    }

    /// Capture the process environment plus `overrides` for later runs.
    pub fn prime(&self, overrides: Env) -> Result<()> {
        self.prime_with(overrides, PrimeOptions::default())
    }

    /// Store a base environment (process env or empty) with `overrides`
    /// merged on top. Re-priming is allowed; it only logs.
    pub fn prime_with(&self, overrides: Env, opts: PrimeOptions) -> Result<()> {
        let current = self.state.load()?;

        if let Some(pid) = current.pid {
            if matches!(self.trigger, Trigger::Every(_)) {
                warn!(%pid, "re-priming an already running command");
            } else {
                info!(
                    %pid,
                    "re-priming an already launched command; this only takes effect after a restart"
                );
            }
        }

        if !current.env.is_empty() && !opts.overwrite {
            warn!(key = %self.options.key, "already primed; overriding");
        }

        let mut env = if opts.use_process_env {
            process_env()
        } else {
            Env::new()
        };
        env.extend(overrides);

        debug!(vars = env.len(), "environment primed");
        self.state.update(|s| s.env = env)?;
        Ok(())
    }

    /// Launch the re-dispatch process and record its pid.
    ///
    /// `env` replaces the primed snapshot for this launch when it is present
    /// and non-empty.
    pub fn start(&self, env: Option<Env>) -> Result<ProcessId> {
        let current = self.state.load()?;

        if let Some(pid) = current.pid {
            if self.trigger.is_long_running() {
                warn!(%pid, "resurrect is already running");
            }
        }

        let mut env = match env {
            Some(env) if !env.is_empty() => env,
            _ => {
                debug!("using stored env");
                current.env
            }
        };

        if env.is_empty() && !self.options.allow_empty_env {
            warn!(
                "launching resurrect process with empty env; dispatch will most likely fail"
            );
        }

        let hook = self.hook_path();
        info!(
            previous = env.get(JUJU_DISPATCH_PATH).map(String::as_str).unwrap_or(""),
            %hook,
            "overriding dispatch path"
        );
        env.insert(JUJU_DISPATCH_PATH.to_string(), hook);
        // Without the marker the host looks for a hook registered on the charm
        // itself instead of routing to ours.
        env.insert(OPERATOR_DISPATCH.to_string(), "1".to_string());

        let dispatch = self.dispatch_entrypoint()?;
        let plan = launcher::plan(&self.trigger, &dispatch, env);
        let pid = self.launcher.launch(&plan)?;

        info!(%pid, trigger = self.trigger.kind(), "resurrect process running");
        self.state.update(|s| s.pid = Some(pid))?;
        Ok(pid)
    }

    /// Signal the outstanding process (or `pid`) and forget it.
    ///
    /// The stored pid is cleared even when signaling fails; the signaling
    /// error is still returned. Termination is never confirmed.
    pub fn stop(&self, pid: Option<ProcessId>, signal: Signal) -> Result<()> {
        let target = match pid {
            Some(pid) => pid,
            None => self.state.load()?.pid.ok_or(ResurrectError::NotStarted)?,
        };

        let signalled = self.launcher.signal(target, signal);
        self.state.update(|s| s.pid = None)?;

        match &signalled {
            Ok(()) => info!(pid = %target, %signal, "resurrect process signalled"),
            Err(e) => warn!(pid = %target, %signal, "signal failed, pid forgotten anyway: {e}"),
        }
        signalled
    }

    fn dispatch_entrypoint(&self) -> Result<PathBuf> {
        let charm_dir = self
            .options
            .charm_dir
            .clone()
            .or_else(|| std::env::var_os(JUJU_CHARM_DIR).map(PathBuf::from))
            .ok_or_else(|| ResurrectError::MissingEnv {
                var: JUJU_CHARM_DIR.to_string(),
            })?;
        Ok(charm_dir.join(DISPATCH_FILE))
    }
}

/// Current process environment. Non-UTF-8 entries cannot be persisted and
/// are skipped.
fn process_env() -> Env {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
