//! Native WSL API (`wslapi.dll`).
//!
//! These calls block; callers run them on the blocking thread pool.

use std::path::Path;

use d2w_core::error::Result;

#[cfg(windows)]
mod imp {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use windows_sys::Win32::System::SubsystemForLinux::{
        WslIsDistributionRegistered, WslLaunchInteractive, WslRegisterDistribution,
        WslUnregisterDistribution,
    };

    use d2w_core::error::{ConvertError, Result};

    fn wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(once(0)).collect()
    }

    fn hresult_message(hr: i32) -> String {
        format!("HRESULT 0x{:08X}", hr as u32)
    }

    pub fn is_registered(name: &str) -> bool {
        let name = wide(OsStr::new(name));
        // SAFETY: `name` is a NUL-terminated UTF-16 buffer that outlives the call.
        unsafe { WslIsDistributionRegistered(name.as_ptr()) != 0 }
    }

    pub fn unregister(name: &str) -> Result<()> {
        if !is_registered(name) {
            return Err(ConvertError::DistributionNotFound(name.to_string()));
        }
        let wname = wide(OsStr::new(name));
        // SAFETY: see `is_registered`.
        let hr = unsafe { WslUnregisterDistribution(wname.as_ptr()) };
        if hr < 0 {
            return Err(ConvertError::HostCommandError {
                command: "WslUnregisterDistribution".to_string(),
                message: hresult_message(hr),
            });
        }
        Ok(())
    }

    pub fn register(name: &str, archive: &Path) -> Result<()> {
        let wname = wide(OsStr::new(name));
        let warchive = wide(archive.as_os_str());
        // SAFETY: both buffers are NUL-terminated and outlive the call.
        let hr = unsafe { WslRegisterDistribution(wname.as_ptr(), warchive.as_ptr()) };
        if hr < 0 {
            return Err(ConvertError::RegisterError {
                name: name.to_string(),
                message: hresult_message(hr),
            });
        }
        Ok(())
    }

    pub fn launch_interactive(name: &str) -> Result<u32> {
        let wname = wide(OsStr::new(name));
        let empty = wide(OsStr::new(""));
        let mut exit_code: u32 = 0;
        // SAFETY: buffers are NUL-terminated, `exit_code` is a valid out pointer.
        let hr = unsafe { WslLaunchInteractive(wname.as_ptr(), empty.as_ptr(), 1, &mut exit_code) };
        if hr < 0 {
            return Err(ConvertError::LaunchError(format!(
                "WslLaunchInteractive failed for '{name}': {}",
                hresult_message(hr)
            )));
        }
        Ok(exit_code)
    }
}

#[cfg(not(windows))]
mod imp {
    use std::path::Path;

    use d2w_core::error::{ConvertError, Result};

    fn unsupported(call: &str) -> ConvertError {
        ConvertError::Unsupported(format!("{call} requires the Windows WSL API"))
    }

    pub fn unregister(_name: &str) -> Result<()> {
        Err(unsupported("WslUnregisterDistribution"))
    }

    pub fn register(_name: &str, _archive: &Path) -> Result<()> {
        Err(unsupported("WslRegisterDistribution"))
    }

    pub fn launch_interactive(_name: &str) -> Result<u32> {
        Err(unsupported("WslLaunchInteractive"))
    }
}

pub fn unregister(name: &str) -> Result<()> {
    imp::unregister(name)
}

pub fn register(name: &str, archive: &Path) -> Result<()> {
    imp::register(name, archive)
}

/// Returns the session's exit code.
pub fn launch_interactive(name: &str) -> Result<u32> {
    imp::launch_interactive(name)
}
