//! FunctionsNetHost Core - Native Host Cold-Start Pipeline
//!
//! The native host starts before the user's function app is known. It
//! primes the .NET runtime by running a generic placeholder app, configured
//! entirely through environment variables, and hands the launch to a
//! background task so the entrypoint can move on to waiting for
//! specialization.
//!
//! # Layers:
//! - `env` / `logger` / `platform`: ambient process state
//! - `ffi` / `loader`: running a managed assembly through hostfxr
//! - `supervisor`: ownership of detached background launches
//! - `prejit`: placeholder discovery, environment signaling, dispatch

pub mod config;
pub mod env;
pub mod error;
pub mod ffi;
pub mod loader;
pub mod logger;
pub mod platform;
pub mod prejit;
pub mod supervisor;

pub use config::{CliArgs, NetHostRunOptions};
pub use env::{EnvironmentStore, InMemoryEnvironment, ProcessEnvironment};
pub use error::{ConfigError, LoaderError, PreJitError};
pub use loader::{AppLoader, HostFxrLoader};
pub use platform::Platform;
pub use prejit::{JitTraceStatus, PlaceholderLayout, PreJitLaunch, PreJitManager, PreJitStage};
pub use supervisor::{BackgroundFailure, Supervisor};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// Install logging and announce the host.
///
/// Hold the returned guard for the life of the process; dropping it flushes
/// and stops the log writer.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let guard = logger::init(verbose);
    info!("Initializing FunctionsNetHost v{}", env!("CARGO_PKG_VERSION"));
    guard
}
