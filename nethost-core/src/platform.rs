//! Platform capability lookup.
//!
//! Artifacts shipped with the placeholder app differ per operating system.
//! The platform is resolved once at startup and passed around as a value so
//! every platform's behavior can be exercised on any build host.

use std::fmt;

/// Operating system family the host is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    /// Resolve the platform of the running process.
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`.
    pub fn from_os_name(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }

    /// File name of the cold-start JIT trace recorded for this platform.
    pub fn jit_trace_file_name(self) -> &'static str {
        match self {
            Platform::Linux => "linux.coldstart.jittrace",
            _ => "coldstart.jittrace",
        }
    }

    /// File name of the hostfxr shared library.
    pub fn hostfxr_library_name(self) -> &'static str {
        match self {
            Platform::Windows => "hostfxr.dll",
            Platform::MacOs => "libhostfxr.dylib",
            Platform::Linux | Platform::Other => "libhostfxr.so",
        }
    }

    /// Well-known .NET install roots probed when `DOTNET_ROOT` is unset.
    pub fn default_dotnet_roots(self) -> &'static [&'static str] {
        match self {
            Platform::Windows => &["C:\\Program Files\\dotnet"],
            Platform::MacOs => &["/usr/local/share/dotnet"],
            Platform::Linux | Platform::Other => &["/usr/share/dotnet", "/usr/lib/dotnet"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Other => "other",
        };
        f.write_str(name)
    }
}
