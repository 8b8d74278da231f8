//! hostfxr-backed application loader.
//!
//! Locates `hostfxr` under a .NET install root, loads it with libloading,
//! and runs an assembly through the command-line hosting entry points:
//!
//! ```text
//! <root>/host/fxr/<version>/libhostfxr.so
//!   hostfxr_initialize_for_dotnet_command_line([assembly])
//!   hostfxr_set_runtime_property_value(AZURE_FUNCTIONS_NATIVE_HOST, 1)
//!   hostfxr_run_app
//!   hostfxr_close
//! ```
//!
//! Loaded libraries are kept for the lifetime of the loader; unloading
//! hostfxr while the runtime it started is alive is undefined behavior.

use libloading::{Library, Symbol};
use std::fs;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::AppLoader;
use crate::env::{vars, EnvironmentStore};
use crate::error::LoaderError;
use crate::ffi::{
    self, symbols, CloseFn, HostfxrHandle, InitializeForDotnetCommandLineFn, NativeString,
    RunAppFn, SetRuntimePropertyValueFn,
};
use crate::platform::Platform;

/// Runtime property telling managed code it runs under the native host.
pub const NATIVE_HOST_PROPERTY: &str = "AZURE_FUNCTIONS_NATIVE_HOST";

/// Entry points resolved from a loaded hostfxr.
///
/// Function pointers stay valid while the owning [`Library`] is loaded.
#[derive(Clone, Copy)]
struct HostFxrApi {
    initialize: InitializeForDotnetCommandLineFn,
    set_runtime_property: SetRuntimePropertyValueFn,
    run_app: RunAppFn,
    close: CloseFn,
}

impl HostFxrApi {
    fn resolve(lib: &Library) -> Result<Self, LoaderError> {
        unsafe {
            let initialize: Symbol<InitializeForDotnetCommandLineFn> = lib
                .get(symbols::INITIALIZE_FOR_DOTNET_COMMAND_LINE)
                .map_err(|_| {
                    LoaderError::MissingExport("hostfxr_initialize_for_dotnet_command_line")
                })?;
            let set_runtime_property: Symbol<SetRuntimePropertyValueFn> = lib
                .get(symbols::SET_RUNTIME_PROPERTY_VALUE)
                .map_err(|_| LoaderError::MissingExport("hostfxr_set_runtime_property_value"))?;
            let run_app: Symbol<RunAppFn> = lib
                .get(symbols::RUN_APP)
                .map_err(|_| LoaderError::MissingExport("hostfxr_run_app"))?;
            let close: Symbol<CloseFn> = lib
                .get(symbols::CLOSE)
                .map_err(|_| LoaderError::MissingExport("hostfxr_close"))?;

            Ok(Self {
                initialize: *initialize,
                set_runtime_property: *set_runtime_property,
                run_app: *run_app,
                close: *close,
            })
        }
    }
}

/// An initialized host context, closed on drop.
struct HostContext {
    handle: HostfxrHandle,
    close: CloseFn,
}

impl Drop for HostContext {
    fn drop(&mut self) {
        let status = unsafe { (self.close)(self.handle) };
        if !ffi::is_success(status) {
            warn!(status = format_args!("{status:#010x}"), "hostfxr_close failed");
        }
    }
}

/// [`AppLoader`] that runs assemblies through the .NET hosting layer.
pub struct HostFxrLoader {
    platform: Platform,
    /// .NET install roots, probed in order.
    search_roots: Vec<PathBuf>,
    /// Loaded hostfxr libraries (kept alive to prevent symbol unloading)
    libraries: Mutex<Vec<Library>>,
}

impl HostFxrLoader {
    /// Create a loader probing the platform's default install roots.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            search_roots: platform
                .default_dotnet_roots()
                .iter()
                .map(PathBuf::from)
                .collect(),
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Create a loader whose first search root is `dotnet_root`, else
    /// `DOTNET_ROOT`, followed by the platform defaults.
    pub fn from_environment(
        platform: Platform,
        env: &dyn EnvironmentStore,
        dotnet_root: Option<PathBuf>,
    ) -> Self {
        let mut loader = Self::new(platform);
        let preferred = dotnet_root.or_else(|| env.get_string(vars::DOTNET_ROOT).map(PathBuf::from));
        if let Some(root) = preferred {
            loader.search_roots.insert(0, root);
        }
        loader
    }

    /// Add a search root probed after the existing ones.
    pub fn add_search_root(&mut self, root: PathBuf) {
        self.search_roots.push(root);
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    /// Find hostfxr in the newest `host/fxr/<version>` directory of the first
    /// search root that has one.
    pub fn resolve_hostfxr_path(&self) -> Result<PathBuf, LoaderError> {
        let library_name = self.platform.hostfxr_library_name();
        let mut searched = Vec::with_capacity(self.search_roots.len());

        for root in &self.search_roots {
            let fxr_root = root.join("host").join("fxr");
            searched.push(fxr_root.clone());

            if !fxr_root.is_dir() {
                debug!("Search root {:?} has no host/fxr, skipping", root);
                continue;
            }
            if let Some(path) = newest_hostfxr(&fxr_root, library_name) {
                return Ok(path);
            }
        }

        Err(LoaderError::HostFxrNotFound { searched })
    }

    fn load(&self, path: &Path) -> Result<HostFxrApi, LoaderError> {
        let lib = unsafe { Library::new(path) }.map_err(|source| LoaderError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let api = HostFxrApi::resolve(&lib)?;

        self.libraries
            .lock()
            .expect("library list poisoned")
            .push(lib);
        Ok(api)
    }
}

impl AppLoader for HostFxrLoader {
    fn run_application(&self, assembly_path: &Path) -> Result<i32, LoaderError> {
        let hostfxr_path = self.resolve_hostfxr_path()?;
        trace!(path = %hostfxr_path.display(), "hostfxr path resolved");

        let api = self.load(&hostfxr_path)?;
        trace!("hostfxr loaded");

        let assembly = NativeString::new(assembly_path)
            .ok_or_else(|| LoaderError::InvalidPath(assembly_path.to_path_buf()))?;
        let argv = [assembly.as_ptr()];
        let mut handle: HostfxrHandle = ptr::null_mut();

        let status = unsafe { (api.initialize)(1, argv.as_ptr(), ptr::null(), &mut handle) };
        if handle.is_null() {
            return Err(LoaderError::InitializeFailed {
                path: assembly_path.to_path_buf(),
                status,
            });
        }
        let context = HostContext {
            handle,
            close: api.close,
        };
        if !ffi::is_success(status) {
            return Err(LoaderError::InitializeFailed {
                path: assembly_path.to_path_buf(),
                status,
            });
        }
        trace!(assembly = %assembly_path.display(), "hostfxr initialized");

        set_runtime_property(&api, &context, NATIVE_HOST_PROPERTY, "1");

        info!(assembly = %assembly_path.display(), "Running application");
        let exit_code = unsafe { (api.run_app)(context.handle) };
        debug!(exit_code, "Application returned");

        Ok(exit_code)
    }

    fn loader_type(&self) -> &str {
        "hostfxr"
    }
}

fn set_runtime_property(api: &HostFxrApi, context: &HostContext, name: &str, value: &str) {
    let (Some(n), Some(v)) = (NativeString::new(name), NativeString::new(value)) else {
        return;
    };
    let status = unsafe { (api.set_runtime_property)(context.handle, n.as_ptr(), v.as_ptr()) };
    if !ffi::is_success(status) {
        warn!(
            property = name,
            status = format_args!("{status:#010x}"),
            "Failed to set runtime property"
        );
    }
}

/// Pick the highest-versioned directory under `fxr_root` containing
/// `library_name`.
fn newest_hostfxr(fxr_root: &Path, library_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(fxr_root).ok()?;

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let version = FxrVersion::parse(&name)?;
            let candidate = entry.path().join(library_name);
            candidate.is_file().then_some((version, candidate))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Directory version under `host/fxr`, e.g. `8.0.1` or `9.0.0-preview.3`.
///
/// Numeric components compare first; a release sorts above any prerelease
/// of the same numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FxrVersion {
    numbers: Vec<u64>,
    is_release: bool,
}

impl FxrVersion {
    fn parse(s: &str) -> Option<Self> {
        let (core, prerelease) = match s.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (s, None),
        };
        let numbers = core
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if numbers.is_empty() {
            return None;
        }
        Some(Self {
            numbers,
            is_release: prerelease.is_none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnvironment;

    fn lay_out_fxr(root: &Path, version: &str, platform: Platform) -> PathBuf {
        let dir = root.join("host").join("fxr").join(version);
        fs::create_dir_all(&dir).unwrap();
        let lib = dir.join(platform.hostfxr_library_name());
        fs::write(&lib, b"").unwrap();
        lib
    }

    #[test]
    fn test_version_ordering() {
        let v = |s: &str| FxrVersion::parse(s).unwrap();
        assert!(v("8.0.10") > v("8.0.9"));
        assert!(v("10.0.0") > v("9.0.0"));
        assert!(v("9.0.0") > v("9.0.0-preview.3"));
        assert!(FxrVersion::parse("latest").is_none());
        assert!(FxrVersion::parse("").is_none());
    }

    #[test]
    fn test_resolve_picks_newest_version() {
        let root = tempfile::tempdir().unwrap();
        lay_out_fxr(root.path(), "6.0.25", Platform::Linux);
        let newest = lay_out_fxr(root.path(), "8.0.1", Platform::Linux);
        lay_out_fxr(root.path(), "8.0.1-rc.2", Platform::Linux);
        fs::create_dir_all(root.path().join("host/fxr/not-a-version")).unwrap();

        let mut loader = HostFxrLoader::new(Platform::Linux);
        loader.search_roots.clear();
        loader.add_search_root(root.path().to_path_buf());

        assert_eq!(loader.resolve_hostfxr_path().unwrap(), newest);
    }

    #[test]
    fn test_resolve_skips_versions_without_library() {
        let root = tempfile::tempdir().unwrap();
        let expected = lay_out_fxr(root.path(), "7.0.0", Platform::Linux);
        fs::create_dir_all(root.path().join("host/fxr/9.0.0")).unwrap();

        let mut loader = HostFxrLoader::new(Platform::Linux);
        loader.search_roots.clear();
        loader.add_search_root(root.path().to_path_buf());

        assert_eq!(loader.resolve_hostfxr_path().unwrap(), expected);
    }

    #[test]
    fn test_environment_root_is_probed_first() {
        let env = InMemoryEnvironment::with_values([(vars::DOTNET_ROOT, "/opt/dotnet")]);
        let loader = HostFxrLoader::from_environment(Platform::Linux, &env, None);
        assert_eq!(loader.search_roots()[0], PathBuf::from("/opt/dotnet"));

        let loader = HostFxrLoader::from_environment(
            Platform::Linux,
            &env,
            Some(PathBuf::from("/custom/dotnet")),
        );
        assert_eq!(loader.search_roots()[0], PathBuf::from("/custom/dotnet"));
        assert!(!loader.search_roots().contains(&PathBuf::from("/opt/dotnet")));
    }

    #[test]
    fn test_run_without_hostfxr_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut loader = HostFxrLoader::new(Platform::Linux);
        loader.search_roots.clear();
        loader.add_search_root(root.path().to_path_buf());

        let err = loader
            .run_application(Path::new("/app/Placeholder.dll"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::HostFxrNotFound { searched } if searched.len() == 1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_run_with_invalid_library_fails_to_load() {
        let root = tempfile::tempdir().unwrap();
        let lib = lay_out_fxr(root.path(), "8.0.1", Platform::Linux);
        let mut loader = HostFxrLoader::new(Platform::Linux);
        loader.search_roots.clear();
        loader.add_search_root(root.path().to_path_buf());

        let err = loader
            .run_application(Path::new("/app/Placeholder.dll"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::Load { path, .. } if path == lib));
    }

    #[test]
    fn test_loader_type() {
        assert_eq!(HostFxrLoader::new(Platform::current()).loader_type(), "hostfxr");
    }
}
