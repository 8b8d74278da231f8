//! Environment Utilities - Process Environment as a Configuration Channel
//!
//! The managed runtime is never called directly while it is being primed.
//! Everything it needs to know (startup hooks, the pre-JIT trace) is handed
//! over through process environment variables that it reads at its own
//! startup. This module owns the variable names and the store abstraction
//! used to write them.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Environment variable names shared with the managed runtime and the
/// placeholder app. Treated as opaque constants.
pub mod vars {
    /// Assemblies the runtime executes before the application entrypoint.
    pub const DOTNET_STARTUP_HOOKS: &str = "DOTNET_STARTUP_HOOKS";

    /// Path of the cold-start JIT trace consumed by the placeholder app.
    pub const PREJIT_FILE_PATH: &str = "AZURE_FUNCTIONS_PREJIT_FILE_PATH";

    /// Runtime version used to select the placeholder build.
    pub const FUNCTIONS_WORKER_RUNTIME_VERSION: &str = "FUNCTIONS_WORKER_RUNTIME_VERSION";

    /// Enables trace-level host diagnostics when set to `1` or `true`.
    pub const NETHOST_TRACE: &str = "AZURE_FUNCTIONS_NETHOST_TRACE";

    /// Root of the .NET installation used to locate hostfxr.
    pub const DOTNET_ROOT: &str = "DOTNET_ROOT";
}

/// Read/write access to a set of environment variables.
///
/// Production code writes the real process environment; tests substitute
/// [`InMemoryEnvironment`] so they never race on process-wide state.
pub trait EnvironmentStore: Send + Sync {
    /// Set `name` to `value`, replacing any previous value.
    fn set_value(&self, name: &str, value: &OsStr);

    /// Read the current value of `name`, if set.
    fn get_value(&self, name: &str) -> Option<OsString>;

    /// Read `name` as UTF-8, treating empty and non-UTF-8 values as unset.
    fn get_string(&self, name: &str) -> Option<String> {
        self.get_value(name)
            .and_then(|v| v.into_string().ok())
            .filter(|v| !v.is_empty())
    }

    /// Returns `true` if `name` holds `1` or `true` (case-insensitive).
    fn is_enabled(&self, name: &str) -> bool {
        self.get_string(name)
            .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

/// The environment of the current process.
///
/// Writes are visible to the managed runtime hosted in this process because
/// it reads the same environment block when it starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentStore for ProcessEnvironment {
    fn set_value(&self, name: &str, value: &OsStr) {
        trace!(name, value = %value.to_string_lossy(), "Setting environment variable");
        std::env::set_var(name, value);
    }

    fn get_value(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }
}

/// An isolated, thread-safe environment map.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnvironment {
    values: Arc<RwLock<HashMap<String, OsString>>>,
}

impl InMemoryEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment pre-populated with `pairs`.
    pub fn with_values<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OsString>,
    {
        let env = Self::new();
        {
            let mut values = env.values.write().expect("environment lock poisoned");
            for (k, v) in pairs {
                values.insert(k.into(), v.into());
            }
        }
        env
    }

    /// Number of variables currently set.
    pub fn len(&self) -> usize {
        self.values.read().expect("environment lock poisoned").len()
    }

    /// Returns `true` when no variable is set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EnvironmentStore for InMemoryEnvironment {
    fn set_value(&self, name: &str, value: &OsStr) {
        self.values
            .write()
            .expect("environment lock poisoned during set")
            .insert(name.to_owned(), value.to_owned());
    }

    fn get_value(&self, name: &str) -> Option<OsString> {
        self.values
            .read()
            .expect("environment lock poisoned during get")
            .get(name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_set_and_get() {
        let env = InMemoryEnvironment::new();
        assert!(env.is_empty());

        env.set_value(vars::DOTNET_STARTUP_HOOKS, OsStr::new("/app/hook.dll"));
        assert_eq!(
            env.get_value(vars::DOTNET_STARTUP_HOOKS),
            Some(OsString::from("/app/hook.dll"))
        );
        assert_eq!(env.len(), 1);
        assert!(env.get_value(vars::PREJIT_FILE_PATH).is_none());
    }

    #[test]
    fn test_in_memory_clones_share_state() {
        let env = InMemoryEnvironment::new();
        let other = env.clone();
        other.set_value("A", OsStr::new("1"));
        assert_eq!(env.get_string("A").as_deref(), Some("1"));
    }

    #[test]
    fn test_get_string_treats_empty_as_unset() {
        let env = InMemoryEnvironment::with_values([("EMPTY", "")]);
        assert!(env.get_value("EMPTY").is_some());
        assert!(env.get_string("EMPTY").is_none());
    }

    #[test]
    fn test_is_enabled() {
        let env = InMemoryEnvironment::with_values([
            ("ONE", "1"),
            ("TRUE", "True"),
            ("ZERO", "0"),
            ("WORD", "yes"),
        ]);
        assert!(env.is_enabled("ONE"));
        assert!(env.is_enabled("TRUE"));
        assert!(!env.is_enabled("ZERO"));
        assert!(!env.is_enabled("WORD"));
        assert!(!env.is_enabled("MISSING"));
    }

    #[test]
    fn test_concurrent_writers() {
        let env = InMemoryEnvironment::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let env = env.clone();
            handles.push(std::thread::spawn(move || {
                env.set_value(&format!("VAR_{i}"), OsStr::new("x"));
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }
        assert_eq!(env.len(), 8);
    }
}
