//! nethost - native host for .NET function apps
//!
//! Resolves run options, warms the runtime with the placeholder app, and
//! stays up while the placeholder runs.

use anyhow::{Context, Result};
use clap::Parser;
use nethost_core::supervisor::shutdown_runtime;
use nethost_core::{
    init, CliArgs, EnvironmentStore, HostFxrLoader, NetHostRunOptions, Platform, PreJitManager,
    ProcessEnvironment, Supervisor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long blocking tasks get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    let args = CliArgs::parse();
    // Dropped last so lines logged during shutdown are flushed.
    let _log_guard = init(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?;
    let supervisor = Supervisor::new(runtime.handle().clone());

    let result = runtime.block_on(run(args, supervisor.clone()));

    // The placeholder app may never return; do not wait on it.
    shutdown_runtime(runtime, &supervisor, SHUTDOWN_GRACE);
    result
}

async fn run(args: CliArgs, supervisor: Supervisor) -> Result<()> {
    let env: Arc<dyn EnvironmentStore> = Arc::new(ProcessEnvironment);
    let options = NetHostRunOptions::resolve(&args, env.as_ref())
        .context("Failed to resolve run options")?;
    debug!("Run options: {}", serde_json::to_string(&options)?);

    let platform = Platform::current();

    if args.no_prejit {
        info!("Pre-jit disabled, placeholder app not started");
    } else {
        let loader = Arc::new(HostFxrLoader::from_environment(
            platform,
            env.as_ref(),
            args.dotnet_root.clone(),
        ));
        let manager = PreJitManager::new(env.clone(), platform, supervisor.clone());
        manager
            .initialize_and_run_prejit_placeholder_app(&options, loader)
            .context("Failed to start the placeholder app")?;
    }

    info!("Native host started on {}", platform);

    let background = async {
        if args.no_prejit {
            std::future::pending::<()>().await;
        }
        supervisor.wait().await;
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
        }
        _ = background => {
            debug!("All background tasks finished");
        }
    }

    // Failures were already logged by the supervisor.
    let failures = supervisor.failures();
    if !failures.is_empty() {
        anyhow::bail!("{} background task(s) failed", failures.len());
    }

    Ok(())
}
