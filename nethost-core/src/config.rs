//! Run options for the native host.
//!
//! [`NetHostRunOptions`] is resolved once at process start from the command
//! line and the environment, validated, and then only read.

use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::env::{vars, EnvironmentStore};
use crate::error::ConfigError;

/// Command line of the `nethost` binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "nethost",
    version,
    about = "Native host that pre-warms the .NET runtime before specialization"
)]
pub struct CliArgs {
    /// Directory holding the host binary and the PlaceholderApp tree
    /// (defaults to the directory of the running executable).
    #[arg(long, value_name = "DIR")]
    pub executable_dir: Option<PathBuf>,

    /// Runtime version selecting the placeholder build
    /// (defaults to FUNCTIONS_WORKER_RUNTIME_VERSION).
    #[arg(long, value_name = "VERSION")]
    pub runtime_version: Option<String>,

    /// .NET installation root used to locate hostfxr (defaults to DOTNET_ROOT).
    #[arg(long, value_name = "DIR")]
    pub dotnet_root: Option<PathBuf>,

    /// Skip the placeholder app and pre-JIT warmup.
    #[arg(long)]
    pub no_prejit: bool,

    /// Emit trace-level diagnostics.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Immutable options the host runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetHostRunOptions {
    executable_directory: PathBuf,
    runtime_version: String,
}

impl NetHostRunOptions {
    /// Build validated options.
    ///
    /// Both values must be non-empty and `executable_directory` must be an
    /// existing directory.
    pub fn new(
        executable_directory: impl Into<PathBuf>,
        runtime_version: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let executable_directory = executable_directory.into();
        let runtime_version = runtime_version.into().trim().to_owned();

        if executable_directory.as_os_str().is_empty() {
            return Err(ConfigError::EmptyExecutableDirectory);
        }
        if runtime_version.is_empty() {
            return Err(ConfigError::MissingRuntimeVersion(
                vars::FUNCTIONS_WORKER_RUNTIME_VERSION,
            ));
        }
        if !executable_directory.is_dir() {
            return Err(ConfigError::ExecutableDirectoryNotFound(executable_directory));
        }

        Ok(Self {
            executable_directory,
            runtime_version,
        })
    }

    /// Resolve options from the command line, falling back to the
    /// environment and the location of the running binary.
    pub fn resolve(args: &CliArgs, env: &dyn EnvironmentStore) -> Result<Self, ConfigError> {
        let executable_directory = match &args.executable_dir {
            Some(dir) => dir.clone(),
            None => current_exe_dir()?,
        };

        let runtime_version = args
            .runtime_version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env.get_string(vars::FUNCTIONS_WORKER_RUNTIME_VERSION))
            .ok_or(ConfigError::MissingRuntimeVersion(
                vars::FUNCTIONS_WORKER_RUNTIME_VERSION,
            ))?;

        Self::new(executable_directory, runtime_version)
    }

    pub fn executable_directory(&self) -> &Path {
        &self.executable_directory
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }
}

fn current_exe_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::CurrentExe)?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or(ConfigError::EmptyExecutableDirectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnvironment;

    #[test]
    fn test_new_validates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let opts = NetHostRunOptions::new(dir.path(), "8.0.1").unwrap();
        assert_eq!(opts.executable_directory(), dir.path());
        assert_eq!(opts.runtime_version(), "8.0.1");

        let missing = dir.path().join("nope");
        assert!(matches!(
            NetHostRunOptions::new(&missing, "8.0.1"),
            Err(ConfigError::ExecutableDirectoryNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_new_rejects_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NetHostRunOptions::new("", "8.0.1"),
            Err(ConfigError::EmptyExecutableDirectory)
        ));
        assert!(matches!(
            NetHostRunOptions::new(dir.path(), "  "),
            Err(ConfigError::MissingRuntimeVersion(_))
        ));
    }

    #[test]
    fn test_new_trims_runtime_version() {
        let dir = tempfile::tempdir().unwrap();
        let opts = NetHostRunOptions::new(dir.path(), " 8.0.1 ").unwrap();
        assert_eq!(opts.runtime_version(), "8.0.1");
    }

    #[test]
    fn test_resolve_prefers_cli_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = InMemoryEnvironment::with_values([(
            vars::FUNCTIONS_WORKER_RUNTIME_VERSION,
            "7.0.0",
        )]);
        let args = CliArgs {
            executable_dir: Some(dir.path().to_path_buf()),
            runtime_version: Some("8.0.1".into()),
            ..Default::default()
        };
        let opts = NetHostRunOptions::resolve(&args, &env).unwrap();
        assert_eq!(opts.runtime_version(), "8.0.1");
    }

    #[test]
    fn test_resolve_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env = InMemoryEnvironment::with_values([(
            vars::FUNCTIONS_WORKER_RUNTIME_VERSION,
            "7.0.0",
        )]);
        let args = CliArgs {
            executable_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let opts = NetHostRunOptions::resolve(&args, &env).unwrap();
        assert_eq!(opts.runtime_version(), "7.0.0");
    }

    #[test]
    fn test_resolve_without_version_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = CliArgs {
            executable_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = NetHostRunOptions::resolve(&args, &InMemoryEnvironment::new()).unwrap_err();
        assert!(err.to_string().contains("FUNCTIONS_WORKER_RUNTIME_VERSION"));
    }

    #[test]
    fn test_resolve_defaults_to_current_exe_dir() {
        let args = CliArgs {
            runtime_version: Some("8.0.1".into()),
            ..Default::default()
        };
        let opts = NetHostRunOptions::resolve(&args, &InMemoryEnvironment::new()).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(opts.executable_directory(), exe.parent().unwrap());
    }

    #[test]
    fn test_cli_parsing() {
        let args = CliArgs::parse_from([
            "nethost",
            "--executable-dir",
            "/app",
            "--runtime-version",
            "8.0.1",
            "--no-prejit",
            "-v",
        ]);
        assert_eq!(args.executable_dir.as_deref(), Some(Path::new("/app")));
        assert_eq!(args.runtime_version.as_deref(), Some("8.0.1"));
        assert!(args.no_prejit);
        assert!(args.verbose);
        assert!(args.dotnet_root.is_none());
    }

    #[test]
    fn test_options_serialize_as_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let opts = NetHostRunOptions::new(dir.path(), "8.0.1").unwrap();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"executableDirectory\""));
        assert!(json.contains("\"runtimeVersion\":\"8.0.1\""));
    }
}
