// src/signal.rs
use libc::c_int;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

// Written from signal context; a store on an AtomicBool is async-signal-safe.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// True once SIGTERM (or SIGINT in the supervisor) has been delivered.
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Acquire)
}

extern "C" fn request_shutdown(_signum: c_int) {
    SHUTDOWN.store(true, Ordering::Release);
}

/// Install a disposition for `signum` with SA_RESTART left off, so blocking
/// accept and pause observe EINTR instead of resuming silently.
fn install(signum: c_int, handler: libc::sighandler_t) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(signum, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Supervisor policy: SIGTERM and SIGINT request shutdown, SIGPIPE is ignored.
pub fn install_supervisor_handlers() -> io::Result<()> {
    install(libc::SIGTERM, request_shutdown as libc::sighandler_t)?;
    install(libc::SIGINT, request_shutdown as libc::sighandler_t)?;
    install(libc::SIGPIPE, libc::SIG_IGN)
}

/// Worker and responder policy: SIGTERM requests shutdown, SIGPIPE is ignored.
pub fn install_worker_handlers() -> io::Result<()> {
    install(libc::SIGTERM, request_shutdown as libc::sighandler_t)?;
    install(libc::SIGPIPE, libc::SIG_IGN)
}
