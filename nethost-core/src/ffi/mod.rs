//! FFI Bridge - C ABI of the .NET hosting layer (hostfxr)
//!
//! This module defines the C-ABI types exported by `hostfxr` and the string
//! marshaling needed to call them. Only the subset used to run an
//! application from a command line is described here.
//!
//! `char_t` is UTF-16 on Windows and a narrow (UTF-8) char elsewhere, so
//! strings are converted once into an owned, NUL-terminated buffer and passed
//! by pointer.

use std::ffi::{c_void, OsStr};
use std::os::raw::c_int;

/// Native character type used by hostfxr.
#[cfg(windows)]
pub type CharT = u16;
/// Native character type used by hostfxr.
#[cfg(not(windows))]
pub type CharT = std::os::raw::c_char;

/// Opaque handle to an initialized host context.
pub type HostfxrHandle = *mut c_void;

/// Status code returned by every hostfxr entry point.
pub type HostfxrStatus = i32;

pub const HOSTFXR_SUCCESS: HostfxrStatus = 0;
pub const HOSTFXR_SUCCESS_HOST_ALREADY_INITIALIZED: HostfxrStatus = 0x0000_0001;
pub const HOSTFXR_SUCCESS_DIFFERENT_RUNTIME_PROPERTIES: HostfxrStatus = 0x0000_0002;

/// Returns `true` for any of the success codes (non-negative values).
pub fn is_success(status: HostfxrStatus) -> bool {
    status >= 0
}

/// Optional initialization parameters.
///
/// Layout must match `hostfxr_initialize_parameters` in `hostfxr.h`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostfxrInitializeParameters {
    pub size: usize,
    pub host_path: *const CharT,
    pub dotnet_root: *const CharT,
}

/// `hostfxr_initialize_for_dotnet_command_line`
pub type InitializeForDotnetCommandLineFn = unsafe extern "C" fn(
    argc: c_int,
    argv: *const *const CharT,
    parameters: *const HostfxrInitializeParameters,
    host_context_handle: *mut HostfxrHandle,
) -> HostfxrStatus;

/// `hostfxr_set_runtime_property_value`
pub type SetRuntimePropertyValueFn = unsafe extern "C" fn(
    host_context_handle: HostfxrHandle,
    name: *const CharT,
    value: *const CharT,
) -> HostfxrStatus;

/// `hostfxr_run_app`
pub type RunAppFn = unsafe extern "C" fn(host_context_handle: HostfxrHandle) -> HostfxrStatus;

/// `hostfxr_close`
pub type CloseFn = unsafe extern "C" fn(host_context_handle: HostfxrHandle) -> HostfxrStatus;

/// Exported symbol names, NUL-terminated for `libloading`.
pub mod symbols {
    pub const INITIALIZE_FOR_DOTNET_COMMAND_LINE: &[u8] =
        b"hostfxr_initialize_for_dotnet_command_line\0";
    pub const SET_RUNTIME_PROPERTY_VALUE: &[u8] = b"hostfxr_set_runtime_property_value\0";
    pub const RUN_APP: &[u8] = b"hostfxr_run_app\0";
    pub const CLOSE: &[u8] = b"hostfxr_close\0";
}

/// An owned, NUL-terminated `char_t` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeString {
    buf: Vec<CharT>,
}

impl NativeString {
    /// Convert `s` into the platform's `char_t` encoding.
    ///
    /// Returns `None` if `s` contains an interior NUL.
    #[cfg(not(windows))]
    pub fn new(s: impl AsRef<OsStr>) -> Option<Self> {
        use std::os::unix::ffi::OsStrExt;

        let bytes = s.as_ref().as_bytes();
        if bytes.contains(&0) {
            return None;
        }
        let mut buf: Vec<CharT> = bytes.iter().map(|&b| b as CharT).collect();
        buf.push(0);
        Some(Self { buf })
    }

    /// Convert `s` into the platform's `char_t` encoding.
    ///
    /// Returns `None` if `s` contains an interior NUL.
    #[cfg(windows)]
    pub fn new(s: impl AsRef<OsStr>) -> Option<Self> {
        use std::os::windows::ffi::OsStrExt;

        let mut buf: Vec<CharT> = s.as_ref().encode_wide().collect();
        if buf.contains(&0) {
            return None;
        }
        buf.push(0);
        Some(Self { buf })
    }

    /// Pointer valid for as long as `self` is alive.
    pub fn as_ptr(&self) -> *const CharT {
        self.buf.as_ptr()
    }

    /// Length in `char_t` units, excluding the terminator.
    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
