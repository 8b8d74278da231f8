//! Error types for the native host.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unresolvable run options.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Runtime version is not set (pass --runtime-version or set {0})")]
    MissingRuntimeVersion(&'static str),
    #[error("Executable directory is empty")]
    EmptyExecutableDirectory,
    #[error("Executable directory does not exist: '{}'", .0.display())]
    ExecutableDirectoryNotFound(PathBuf),
    #[error("Failed to resolve the executable directory: {0}")]
    CurrentExe(#[source] std::io::Error),
}

/// Failures of the pre-JIT placeholder pipeline.
#[derive(Error, Debug)]
pub enum PreJitError {
    #[error("Placeholder app assembly not found at the specified path: '{}'", .path.display())]
    PlaceholderNotFound { path: PathBuf },
}

/// Failures while loading or running a managed application.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("hostfxr not found under any of: {}", format_paths(.searched))]
    HostFxrNotFound { searched: Vec<PathBuf> },
    #[error("Failed to load hostfxr from '{}'", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("hostfxr is missing export '{0}'")]
    MissingExport(&'static str),
    #[error("Failed to initialize the .NET runtime for '{}' (status {status:#010x})", .path.display())]
    InitializeFailed { path: PathBuf, status: i32 },
    #[error("Path cannot be passed to the native host: '{}'", .0.display())]
    InvalidPath(PathBuf),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_not_found_names_path() {
        let err = PreJitError::PlaceholderNotFound {
            path: PathBuf::from("/app/PlaceholderApp/8.0.1/FunctionsNetHost.PlaceholderApp.dll"),
        };
        assert_eq!(
            err.to_string(),
            "Placeholder app assembly not found at the specified path: \
             '/app/PlaceholderApp/8.0.1/FunctionsNetHost.PlaceholderApp.dll'"
        );
    }

    #[test]
    fn test_hostfxr_not_found_lists_paths() {
        let err = LoaderError::HostFxrNotFound {
            searched: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        let msg = err.to_string();
        assert!(msg.contains("'/a'"));
        assert!(msg.contains("'/b'"));
    }

    #[test]
    fn test_initialize_failed_formats_status() {
        let err = LoaderError::InitializeFailed {
            path: PathBuf::from("/app/a.dll"),
            status: 0x8000_8096_u32 as i32,
        };
        assert!(err.to_string().contains("0x80008096"));
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::EmptyExecutableDirectory.to_string(),
            "Executable directory is empty"
        );
        let err = ConfigError::ExecutableDirectoryNotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Executable directory does not exist: '/missing'");
    }
}
