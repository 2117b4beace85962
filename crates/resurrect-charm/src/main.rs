use std::sync::Arc;

use resurrect_core::config::ResurrectConfig;
use resurrect_hooks::{DispatchContext, DispatchOutcome, Dispatcher};
use resurrect_store::SqliteStore;
use tracing::info;

mod charm;

fn main() -> anyhow::Result<()> {
    // stdout belongs to the host agent; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resurrect=info,resurrect_charm=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // load config: RESURRECT_CONFIG > $JUJU_CHARM_DIR/resurrect.toml > ./resurrect.toml
    let config_path = std::env::var("RESURRECT_CONFIG").ok();
    let config = ResurrectConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ResurrectConfig::default()
    });

    let ctx = DispatchContext::from_env()?;
    info!(hook = ctx.hook_name(), self_dispatch = ctx.self_dispatch, "dispatching");

    let state_path = config.state_path();
    info!(path = %state_path.display(), "opening state store");
    let store = Arc::new(SqliteStore::open(&state_path)?);

    let charm = charm::IngressCharm::new(&config, store)?;
    let dispatcher = Dispatcher::new();
    charm.register(&dispatcher);

    let outcome = dispatcher.dispatch(&ctx);

    if let Some(pid) = charm.resurrect().pid()? {
        info!(%pid, "re-dispatch outstanding");
    }

    match outcome {
        DispatchOutcome::Handled { failures, .. } if !failures.is_empty() => {
            anyhow::bail!("{} handler(s) failed on {}", failures.len(), ctx.dispatch_path)
        }
        _ => Ok(()),
    }
}
