use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use resurrect_core::config::TriggerConfig;
use resurrect_core::{ResurrectError, Result};

/// Error type a readiness check may return.
pub type CheckError = Box<dyn std::error::Error + Send + Sync>;

type CheckFn = dyn Fn() -> std::result::Result<(), CheckError> + Send + Sync;

/// User-supplied zero-argument readiness check.
///
/// Runs in a forked child with the effective environment installed. It may
/// block or poll for as long as it likes; returning `Ok` marks readiness.
#[derive(Clone)]
pub struct ReadinessCheck {
    name: String,
    check: Arc<CheckFn>,
}

impl ReadinessCheck {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> std::result::Result<(), CheckError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self) -> std::result::Result<(), CheckError> {
        (self.check)()
    }
}

impl fmt::Debug for ReadinessCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What causes the re-dispatch. Exactly one per scheduler.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Re-dispatch once the readiness check succeeds.
    Check(ReadinessCheck),
    /// Re-dispatch every interval until stopped.
    Every(Duration),
    /// Re-dispatch once after the delay.
    Oneshot(Duration),
}

impl Trigger {
    pub fn every(interval: Duration) -> Result<Self> {
        let t = Trigger::Every(interval);
        t.validate()?;
        Ok(t)
    }

    pub fn oneshot(delay: Duration) -> Result<Self> {
        let t = Trigger::Oneshot(delay);
        t.validate()?;
        Ok(t)
    }

    /// Build from the optional-field shape, failing unless exactly one is set.
    pub fn from_parts(
        check: Option<ReadinessCheck>,
        oneshot: Option<Duration>,
        every: Option<Duration>,
    ) -> Result<Self> {
        match (check, oneshot, every) {
            (Some(check), None, None) => Ok(Trigger::Check(check)),
            (None, Some(delay), None) => Trigger::oneshot(delay),
            (None, None, Some(interval)) => Trigger::every(interval),
            _ => Err(ResurrectError::Config(
                "provide exactly one of `check`, `oneshot`, or `every`".to_string(),
            )),
        }
    }

    /// Durations are handed to `sleep`/`watch` in whole seconds.
    pub fn validate(&self) -> Result<()> {
        match self {
            Trigger::Check(_) => Ok(()),
            Trigger::Every(d) | Trigger::Oneshot(d) if d.as_secs() == 0 => {
                Err(ResurrectError::Config(format!(
                    "{} trigger needs at least 1s, got {d:?}",
                    self.kind()
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Check(_) => "check",
            Trigger::Every(_) => "every",
            Trigger::Oneshot(_) => "oneshot",
        }
    }

    /// True when the spawned process keeps running after its first dispatch.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Trigger::Check(_) | Trigger::Every(_))
    }
}

impl TryFrom<&TriggerConfig> for Trigger {
    type Error = ResurrectError;

    fn try_from(config: &TriggerConfig) -> Result<Self> {
        match config {
            TriggerConfig::Every { secs } => Trigger::every(Duration::from_secs(*secs)),
            TriggerConfig::Oneshot { secs } => Trigger::oneshot(Duration::from_secs(*secs)),
        }
    }
}
