//! Application Loader - Running a Managed Assembly In-Process
//!
//! [`AppLoader`] is the seam between the native host and the managed
//! runtime. The pre-JIT pipeline only needs its single operation; the
//! production implementation, [`HostFxrLoader`], drives the .NET hosting
//! layer through `hostfxr`.

pub mod hostfxr;

pub use hostfxr::HostFxrLoader;

use std::path::Path;

use crate::error::LoaderError;

/// Loads a managed assembly into the current process and runs it.
///
/// `run_application` blocks the calling thread until the application's
/// entrypoint returns, which for a hosted app may be never. Callers that
/// must stay responsive dispatch it onto a background task.
pub trait AppLoader: Send + Sync {
    /// Run the assembly at `assembly_path`, returning its exit code.
    fn run_application(&self, assembly_path: &Path) -> Result<i32, LoaderError>;

    /// Short identifier used in diagnostics.
    fn loader_type(&self) -> &str;
}
