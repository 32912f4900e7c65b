//! winpty agent for Windows hosts.
//!
//! Thin owned wrappers over `winpty.dll`. Each wrapper frees its native
//! object on drop, so a failed open releases whatever was already built.

use std::any::Any;
use std::ffi::{c_int, c_void, OsStr};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use tracing::debug;

use super::{downcast, AgentBackend, AgentConfig, AgentConnection, ChildProcess, SpawnConfig};
use crate::session::{SpawnRequest, WinSize};
use crate::sys::win::ProcessHandle;

const WINPTY_FLAG_PLAIN_TEXT: c_int = 1;
const WINPTY_SPAWN_FLAG_AUTO_SHUTDOWN: c_int = 1;

#[link(name = "winpty")]
extern "C" {
    fn winpty_wstr_free(s: *const u16);
    fn winpty_config_new(flags: c_int, err_code: *mut c_void, err_msg: *mut c_void) -> *mut c_void;
    fn winpty_config_free(cfg: *mut c_void);
    fn winpty_config_set_initial_size(
        cfg: *mut c_void,
        cols: c_int,
        rows: c_int,
        err_code: *mut c_void,
        err_msg: *mut c_void,
    ) -> c_int;
    fn winpty_open(cfg: *mut c_void, err_code: *mut c_void, err_msg: *mut c_void) -> *mut c_void;
    fn winpty_conin_name(wp: *mut c_void) -> *const u16;
    fn winpty_conout_name(wp: *mut c_void) -> *const u16;
    fn winpty_spawn_config_new(
        flags: c_int,
        appname: *const u16,
        cmdline: *const u16,
        cwd: *const u16,
        env: *const u16,
        err_code: *mut c_void,
        err_msg: *mut c_void,
    ) -> *mut c_void;
    fn winpty_spawn_config_free(cfg: *mut c_void);
    fn winpty_spawn(
        wp: *mut c_void,
        cfg: *mut c_void,
        process_handle: *mut *mut c_void,
        thread_handle: *mut *mut c_void,
        create_process_error: *mut u32,
        err_code: *mut c_void,
        err_msg: *mut c_void,
    ) -> c_int;
    fn winpty_set_size(
        wp: *mut c_void,
        cols: c_int,
        rows: c_int,
        err_code: *mut c_void,
        err_msg: *mut c_void,
    ) -> c_int;
    fn winpty_free(wp: *mut c_void);
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(Some(0)).collect()
}

/// Encode an environment block. Its own NULs are kept; one more ends it.
fn wide_block(block: &str) -> Vec<u16> {
    block.encode_utf16().chain(Some(0)).collect()
}

fn opt_ptr(s: &Option<Vec<u16>>) -> *const u16 {
    s.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}

/// Copy a winpty-owned wide string and free it.
///
/// # Safety
///
/// `s` must be null or a NUL-terminated string allocated by winpty.
unsafe fn take_wstr(s: *const u16) -> Option<String> {
    if s.is_null() {
        return None;
    }
    let mut len = 0;
    while *s.add(len) != 0 {
        len += 1;
    }
    let text = String::from_utf16_lossy(std::slice::from_raw_parts(s, len));
    winpty_wstr_free(s);
    Some(text)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WinptyBackend;

struct WinptyConfig(*mut c_void);

// SAFETY: winpty objects carry no thread affinity.
unsafe impl Send for WinptyConfig {}

impl AgentConfig for WinptyConfig {
    fn set_initial_size(&mut self, size: WinSize) -> Result<(), String> {
        // SAFETY: self.0 is a live config.
        let ok = unsafe {
            winpty_config_set_initial_size(
                self.0,
                c_int::from(size.cols),
                c_int::from(size.rows),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err("winpty cfg set_initial_size failed".into());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for WinptyConfig {
    fn drop(&mut self) {
        // SAFETY: freed once.
        unsafe { winpty_config_free(self.0) }
    }
}

impl AgentBackend for WinptyBackend {
    fn new_config(&self, plain_text: bool) -> Result<Box<dyn AgentConfig>, String> {
        let flags = if plain_text { WINPTY_FLAG_PLAIN_TEXT } else { 0 };
        // SAFETY: error out-parameters may be null.
        let cfg = unsafe { winpty_config_new(flags, ptr::null_mut(), ptr::null_mut()) };
        if cfg.is_null() {
            return Err("winpty cfg is null".into());
        }
        Ok(Box::new(WinptyConfig(cfg)))
    }

    fn open(&self, config: &dyn AgentConfig) -> Result<Box<dyn AgentConnection>, String> {
        let config = downcast::<WinptyConfig>(config.as_any(), "agent config")?;
        // SAFETY: config.0 is a live config; open fails fast instead of blocking.
        let wp = unsafe { winpty_open(config.0, ptr::null_mut(), ptr::null_mut()) };
        if wp.is_null() {
            return Err("could not open winpty".into());
        }
        debug!("winpty agent opened");
        Ok(Box::new(WinptyConnection(wp)))
    }
}

struct WinptyConnection(*mut c_void);

// SAFETY: winpty calls on one agent may come from any thread.
unsafe impl Send for WinptyConnection {}
unsafe impl Sync for WinptyConnection {}

struct WinptySpawnConfig(*mut c_void);

// SAFETY: see WinptyConfig.
unsafe impl Send for WinptySpawnConfig {}

impl SpawnConfig for WinptySpawnConfig {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for WinptySpawnConfig {
    fn drop(&mut self) {
        // SAFETY: freed once.
        unsafe { winpty_spawn_config_free(self.0) }
    }
}

impl AgentConnection for WinptyConnection {
    fn conin_name(&self) -> Result<String, String> {
        // SAFETY: self.0 is live; the returned string is freed by take_wstr.
        unsafe { take_wstr(winpty_conin_name(self.0)) }
            .ok_or_else(|| "winpty returned no CONIN name".to_string())
    }

    fn conout_name(&self) -> Result<String, String> {
        // SAFETY: as above.
        unsafe { take_wstr(winpty_conout_name(self.0)) }
            .ok_or_else(|| "winpty returned no CONOUT name".to_string())
    }

    fn spawn_config(&self, request: &SpawnRequest<'_>) -> Result<Box<dyn SpawnConfig>, String> {
        let cmdline = wide(OsStr::new(request.command_line));
        let cwd = request.cwd.map(|p: &Path| wide(p.as_os_str()));
        let env = request.env_block.map(wide_block);

        // SAFETY: every string outlives the call; winpty copies them.
        let cfg = unsafe {
            winpty_spawn_config_new(
                WINPTY_SPAWN_FLAG_AUTO_SHUTDOWN,
                ptr::null(),
                cmdline.as_ptr(),
                opt_ptr(&cwd),
                opt_ptr(&env),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if cfg.is_null() {
            return Err("winpty spawn cfg is null".into());
        }
        Ok(Box::new(WinptySpawnConfig(cfg)))
    }

    fn spawn(&self, config: &dyn SpawnConfig) -> Result<Box<dyn ChildProcess>, String> {
        let config = downcast::<WinptySpawnConfig>(config.as_any(), "spawn config")?;
        let mut process: *mut c_void = ptr::null_mut();
        // SAFETY: both objects are live; only the process handle is requested.
        let ok = unsafe {
            winpty_spawn(
                self.0,
                config.0,
                &mut process,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 || process.is_null() {
            return Err("Error running process".into());
        }
        // SAFETY: winpty hands ownership of the process handle to the caller.
        Ok(Box::new(WinptyChild(unsafe { ProcessHandle::from_raw(process) })))
    }

    fn set_size(&self, size: WinSize) -> Result<(), String> {
        // SAFETY: self.0 is live.
        let ok = unsafe {
            winpty_set_size(
                self.0,
                c_int::from(size.cols),
                c_int::from(size.rows),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(format!("winpty_set_size({}x{}) failed", size.cols, size.rows));
        }
        Ok(())
    }
}

impl Drop for WinptyConnection {
    fn drop(&mut self) {
        // SAFETY: freed once.
        unsafe { winpty_free(self.0) }
    }
}

struct WinptyChild(ProcessHandle);

impl ChildProcess for WinptyChild {
    fn exit_code(&self) -> std::io::Result<Option<i32>> {
        self.0.exit_code()
    }

    fn terminate(&self) -> std::io::Result<()> {
        self.0.terminate()
    }

    fn pid(&self) -> Option<u32> {
        self.0.pid()
    }
}
