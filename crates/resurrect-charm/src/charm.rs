//! Ingress charm: waits for its backend to report ready, then gets a
//! `resurrect` hook telling it ingress can be published.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use resurrect::{Env, ReadinessCheck, Resurrect, ResurrectError, DEFAULT_STOP_SIGNAL};
use resurrect_core::config::ResurrectConfig;
use resurrect_hooks::{DispatchContext, Dispatcher, HandlerResult};
use resurrect_store::StateStore;
use tracing::info;

/// Created by the backend once it serves traffic.
pub const READY_FILE: &str = "ingress-ready";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct IngressCharm {
    resurrect: Arc<Resurrect>,
}

impl IngressCharm {
    /// A configured timer trigger takes precedence; otherwise the charm waits
    /// on the ready file.
    pub fn new(config: &ResurrectConfig, store: Arc<dyn StateStore>) -> resurrect::Result<Self> {
        let check = match config.trigger {
            Some(_) => None,
            None => {
                let dir = config.resolve_charm_dir().unwrap_or_else(|| PathBuf::from("."));
                Some(ready_file_check(dir.join(READY_FILE)))
            }
        };
        let resurrect = Resurrect::from_config(config, check, store)?;
        Ok(Self {
            resurrect: Arc::new(resurrect),
        })
    }

    pub fn resurrect(&self) -> &Resurrect {
        &self.resurrect
    }

    /// Wire start/remove and the resurrect trigger.
    pub fn register(&self, dispatcher: &Dispatcher) {
        let r = Arc::clone(&self.resurrect);
        dispatcher.observe("start", move |_ctx: &DispatchContext| -> HandlerResult {
            on_start(&r)?;
            Ok(())
        });

        let r = Arc::clone(&self.resurrect);
        dispatcher.observe("remove", move |_ctx: &DispatchContext| -> HandlerResult {
            on_remove(&r)?;
            Ok(())
        });

        self.resurrect
            .observe_trigger(dispatcher, |ctx: &DispatchContext| -> HandlerResult {
                info!(self_dispatch = ctx.self_dispatch, "Ingress is ready!");
                Ok(())
            });
    }
}

fn on_start(resurrect: &Resurrect) -> resurrect::Result<()> {
    // Current env plus one extra variable for the re-dispatched run.
    let overrides = Env::from([("CUSTOM_ENV_VAR".to_string(), "foo".to_string())]);
    resurrect.prime(overrides)?;
    resurrect.start(None)?;
    Ok(())
}

fn on_remove(resurrect: &Resurrect) -> resurrect::Result<()> {
    match resurrect.stop(None, DEFAULT_STOP_SIGNAL) {
        Err(ResurrectError::NotStarted) => {
            info!("nothing to stop");
            Ok(())
        }
        other => other,
    }
}

fn ready_file_check(path: PathBuf) -> ReadinessCheck {
    ReadinessCheck::new("ready-file", move || {
        wait_for_file(&path);
        Ok(())
    })
}

fn wait_for_file(path: &Path) {
    while !path.exists() {
        std::thread::sleep(POLL_INTERVAL);
    }
}
