//! POSIX resource limits applied to every worker process.
//!
//! On Unix the limits are installed by a `pre_exec` hook, which runs in the forked child right before `execve`.
//! A worker therefore never executes a single instruction of its own code without them.
//! Other platforms have no `setrlimit`; a non-empty configuration is logged and ignored there.
use tokio::process::Command;

/// Per-worker resource limits.
///
/// `None` leaves the limit inherited from the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RlimitConfig {
    /// Maximum number of open file descriptors (`RLIMIT_NOFILE`).
    pub max_open_files: Option<u64>,
    /// Maximum size of a file the worker may write (`RLIMIT_FSIZE`).
    ///
    /// Crossing it delivers `SIGXFSZ`, which the supervisor observes as a signal exit.
    pub max_file_size_bytes: Option<u64>,
    /// Set `RLIMIT_CORE` to zero so crashing workers leave no core files behind.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && self.max_file_size_bytes.is_none()
            && !self.disable_core_dumps
    }

    /// Install the limits on `cmd`. No-op for an empty configuration.
    pub fn attach(&self, cmd: &mut Command) {
        if self.is_empty() {
            return;
        }

        #[cfg(unix)]
        unix::attach(cmd, *self);

        #[cfg(not(unix))]
        {
            let _ = cmd;
            tracing::warn!(
                target: "cronvisor.exec.limits",
                config = ?self,
                "resource limits are not supported on this platform; ignoring"
            );
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::io;

    use tokio::process::Command;

    use super::RlimitConfig;

    cfg_if::cfg_if! {
        if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
            type Resource = libc::__rlimit_resource_t;
        } else {
            type Resource = libc::c_int;
        }
    }

    pub(super) fn attach(cmd: &mut Command, cfg: RlimitConfig) {
        let hook = move || -> io::Result<()> {
            if let Some(n) = cfg.max_open_files {
                set(libc::RLIMIT_NOFILE, n)?;
            }
            if let Some(n) = cfg.max_file_size_bytes {
                set(libc::RLIMIT_FSIZE, n)?;
            }
            if cfg.disable_core_dumps {
                set(libc::RLIMIT_CORE, 0)?;
            }
            Ok(())
        };

        // SAFETY: the hook only calls `setrlimit`, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(hook);
        }
    }

    fn set(resource: Resource, value: u64) -> io::Result<()> {
        let rlim = libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        };
        // SAFETY: `rlim` is a valid, initialised rlimit for the duration of the call.
        if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
