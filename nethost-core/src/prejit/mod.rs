//! Pre-JIT Placeholder Pipeline - Cold-Start Warmup Before Specialization
//!
//! Before the real workload is known, the host runs a generic placeholder
//! app so the managed runtime is already loaded and jitted when
//! specialization arrives. The placeholder is injected as a startup hook and
//! told where the cold-start JIT trace lives, both through environment
//! variables the runtime reads when it starts.
//!
//! On-disk layout, relative to the executable directory:
//!
//! ```text
//! PlaceholderApp/<runtime version>/FunctionsNetHost.PlaceholderApp.dll   (required)
//! PlaceholderApp/<runtime version>/JitTrace/<platform trace file>       (optional)
//! ```
//!
//! A missing placeholder assembly is fatal. A missing trace only costs the
//! warmup and is logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, trace};

use crate::config::NetHostRunOptions;
use crate::env::{vars, EnvironmentStore};
use crate::error::PreJitError;
use crate::loader::AppLoader;
use crate::platform::Platform;
use crate::supervisor::Supervisor;

pub const PLACEHOLDER_APP_DIRECTORY: &str = "PlaceholderApp";
pub const PLACEHOLDER_APP_ASSEMBLY_NAME: &str = "FunctionsNetHost.PlaceholderApp.dll";
pub const JIT_TRACE_DIRECTORY: &str = "JitTrace";

/// Supervisor task name of the placeholder launch.
pub const PLACEHOLDER_TASK: &str = "placeholder-app";

/// Resolved locations of the placeholder artifacts. Nothing here touches
/// the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderLayout {
    app_dir: PathBuf,
    assembly_path: PathBuf,
    jit_trace_path: PathBuf,
}

impl PlaceholderLayout {
    pub fn new(executable_directory: &Path, runtime_version: &str, platform: Platform) -> Self {
        let app_dir = executable_directory
            .join(PLACEHOLDER_APP_DIRECTORY)
            .join(runtime_version);
        let assembly_path = app_dir.join(PLACEHOLDER_APP_ASSEMBLY_NAME);
        let jit_trace_path = app_dir
            .join(JIT_TRACE_DIRECTORY)
            .join(platform.jit_trace_file_name());

        Self {
            app_dir,
            assembly_path,
            jit_trace_path,
        }
    }

    pub fn from_options(options: &NetHostRunOptions, platform: Platform) -> Self {
        Self::new(
            options.executable_directory(),
            options.runtime_version(),
            platform,
        )
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn assembly_path(&self) -> &Path {
        &self.assembly_path
    }

    pub fn jit_trace_path(&self) -> &Path {
        &self.jit_trace_path
    }
}

/// Progress of a single initialization pass. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreJitStage {
    Start,
    PathsResolved,
    PreconditionsChecked,
    EnvironmentConfigured,
    LaunchScheduled,
}

/// What happened to the cold-start trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitTraceStatus {
    /// Found; `AZURE_FUNCTIONS_PREJIT_FILE_PATH` points at it.
    Applied(PathBuf),
    /// Not found at the given path; pre-JIT is skipped.
    Missing(PathBuf),
}

/// Outcome of a successful initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreJitLaunch {
    pub placeholder_assembly: PathBuf,
    pub jit_trace: JitTraceStatus,
    pub stage: PreJitStage,
}

/// Configures the environment for the placeholder app and launches it.
pub struct PreJitManager {
    env: Arc<dyn EnvironmentStore>,
    platform: Platform,
    supervisor: Supervisor,
}

impl PreJitManager {
    pub fn new(env: Arc<dyn EnvironmentStore>, platform: Platform, supervisor: Supervisor) -> Self {
        Self {
            env,
            platform,
            supervisor,
        }
    }

    /// Start the placeholder app for the configured runtime version.
    ///
    /// Runs synchronously up to scheduling the launch, then returns without
    /// waiting for the app to start. Every environment variable is written
    /// before the launch is scheduled. Returns
    /// [`PreJitError::PlaceholderNotFound`] without touching the environment
    /// when the placeholder assembly is absent.
    ///
    /// Meant to be called once per process.
    pub fn initialize_and_run_prejit_placeholder_app(
        &self,
        run_options: &NetHostRunOptions,
        app_loader: Arc<dyn AppLoader>,
    ) -> Result<PreJitLaunch, PreJitError> {
        let mut stage = PreJitStage::Start;
        let layout = PlaceholderLayout::from_options(run_options, self.platform);
        advance(&mut stage, PreJitStage::PathsResolved);

        if !layout.assembly_path().is_file() {
            return Err(PreJitError::PlaceholderNotFound {
                path: layout.assembly_path().to_path_buf(),
            });
        }

        let trace_path = layout.jit_trace_path().to_path_buf();
        let trace_present = trace_path.is_file();
        advance(&mut stage, PreJitStage::PreconditionsChecked);

        let jit_trace = if trace_present {
            self.env.set_value(vars::PREJIT_FILE_PATH, trace_path.as_os_str());
            JitTraceStatus::Applied(trace_path)
        } else {
            info!(
                "Pre-jit file not found at the specified path: '{}'",
                trace_path.display()
            );
            JitTraceStatus::Missing(trace_path)
        };

        self.env
            .set_value(vars::DOTNET_STARTUP_HOOKS, layout.assembly_path().as_os_str());
        advance(&mut stage, PreJitStage::EnvironmentConfigured);

        let placeholder = layout.assembly_path().to_path_buf();
        info!(
            loader = app_loader.loader_type(),
            "Going to run placeholder app: '{}'",
            placeholder.display()
        );

        let launch_path = placeholder.clone();
        // Handle dropped on purpose; the supervisor observes the outcome.
        let _ = self.supervisor.spawn_blocking(PLACEHOLDER_TASK, move || {
            let exit_code = app_loader.run_application(&launch_path)?;
            if exit_code != 0 {
                anyhow::bail!("placeholder app exited with code {exit_code}");
            }
            Ok(())
        });
        advance(&mut stage, PreJitStage::LaunchScheduled);

        Ok(PreJitLaunch {
            placeholder_assembly: placeholder,
            jit_trace,
            stage,
        })
    }
}

fn advance(stage: &mut PreJitStage, next: PreJitStage) {
    let from = *stage;
    trace!(?from, to = ?next, "Pre-jit stage");
    *stage = next;
}
