//! Process-wide resource limits, enforced through rlimits.
use std::io;

/// Limits requested on the command line; zero means unlimited.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceLimits {
    /// CPU time in seconds.
    pub time_s: u64,
    /// Address space in megabytes.
    pub mem_mb: u64,
    /// Output file size in megabytes.
    pub file_mb: u64,
}

impl ResourceLimits {
    /// Install the requested limits for the current process.
    ///
    /// Exceeding the CPU limit raises `SIGXCPU`, which is answered with a diagnostic and exit
    /// code 1. Exceeding the address space limit makes allocation fail, which aborts; the abort
    /// is intercepted the same way. The file size limit leaves `SIGXFSZ` ignored so that an
    /// oversized write surfaces as an `EFBIG` IO error to the caller.
    pub fn apply(&self) -> io::Result<()> {
        if self.time_s > 0 {
            set_rlimit(libc::RLIMIT_CPU, self.time_s)?;
            install_handler(libc::SIGXCPU, on_sigxcpu)?;
        }
        if self.mem_mb > 0 {
            set_rlimit(libc::RLIMIT_AS, self.mem_mb * 1024 * 1024)?;
            install_handler(libc::SIGABRT, on_sigabrt)?;
        }
        if self.file_mb > 0 {
            set_rlimit(libc::RLIMIT_FSIZE, self.file_mb * 1024 * 1024)?;
            ignore_signal(libc::SIGXFSZ)?;
        }
        Ok(())
    }
}

/// Whether an error chain ends in an oversized-write IO error.
pub fn is_file_size_violation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|io_error| io_error.raw_os_error() == Some(libc::EFBIG))
}

fn set_rlimit(resource: libc::__rlimit_resource_t, value: u64) -> io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    if unsafe { libc::setrlimit(resource, &limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn install_handler(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<()> {
    if unsafe { libc::signal(signal, handler as usize) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ignore_signal(signal: libc::c_int) -> io::Result<()> {
    if unsafe { libc::signal(signal, libc::SIG_IGN) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// only async-signal-safe calls are allowed here

extern "C" fn on_sigxcpu(_: libc::c_int) {
    static MSG: &[u8] = b"Time Limit Exceeded\n";
    unsafe {
        libc::write(2, MSG.as_ptr() as *const libc::c_void, MSG.len());
        libc::_exit(1);
    }
}

extern "C" fn on_sigabrt(_: libc::c_int) {
    static MSG: &[u8] = b"Memory Limit Exceeded\n";
    unsafe {
        libc::write(2, MSG.as_ptr() as *const libc::c_void, MSG.len());
        libc::_exit(1);
    }
}
