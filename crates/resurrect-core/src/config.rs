use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Host contract — names the dispatch entrypoint and the spawned env must use
pub const JUJU_CHARM_DIR: &str = "JUJU_CHARM_DIR";
pub const JUJU_DISPATCH_PATH: &str = "JUJU_DISPATCH_PATH";
pub const OPERATOR_DISPATCH: &str = "OPERATOR_DISPATCH";
pub const DISPATCH_FILE: &str = "dispatch";
pub const HOOKS_PREFIX: &str = "hooks/";

pub const DEFAULT_KEY: &str = "resurrect";
pub const CONFIG_FILE: &str = "resurrect.toml";
pub const STATE_FILE: &str = ".resurrect-state.db";
pub const ENV_PREFIX: &str = "RESURRECT_";

/// Top-level config (resurrect.toml + RESURRECT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResurrectConfig {
    /// Names both the persisted state slot and the self-dispatch hook
    /// (`hooks/<key>`).
    #[serde(default = "default_key")]
    pub key: String,
    /// Overrides `$JUJU_CHARM_DIR` when locating the dispatch entrypoint.
    pub charm_dir: Option<PathBuf>,
    /// Silences the empty-environment warning at start.
    #[serde(default)]
    pub allow_empty_env: bool,
    #[serde(default)]
    pub state: StateConfig,
    /// Timer trigger. Readiness-check triggers can only be built in code.
    pub trigger: Option<TriggerConfig>,
}

impl Default for ResurrectConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            charm_dir: None,
            allow_empty_env: false,
            state: StateConfig::default(),
            trigger: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateConfig {
    /// SQLite file holding the persisted state slots. Defaults to
    /// `<charm_dir>/.resurrect-state.db`.
    pub path: Option<PathBuf>,
}

/// Serializable form of the timer triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Re-dispatch every `secs` seconds until stopped.
    Every { secs: u64 },
    /// Re-dispatch once after `secs` seconds.
    Oneshot { secs: u64 },
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

impl ResurrectConfig {
    /// Load config from a TOML file with RESURRECT_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. $JUJU_CHARM_DIR/resurrect.toml
    ///   3. ./resurrect.toml
    ///
    /// A missing file is not an error; defaults apply. Nested keys use a
    /// double underscore, e.g. `RESURRECT_TRIGGER__SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        let config: ResurrectConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| crate::error::ResurrectError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Charm directory from config, falling back to `$JUJU_CHARM_DIR`.
    pub fn resolve_charm_dir(&self) -> Option<PathBuf> {
        self.charm_dir
            .clone()
            .or_else(|| std::env::var_os(JUJU_CHARM_DIR).map(PathBuf::from))
    }

    /// Where the state store lives.
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.state.path {
            return path.clone();
        }
        self.resolve_charm_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(STATE_FILE)
    }
}

fn default_config_path() -> PathBuf {
    std::env::var_os(JUJU_CHARM_DIR)
        .map(|dir| PathBuf::from(dir).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}
