//! Process termination through OS signals.
//!
//! The preprocessor is a batch tool: on SIGINT, SIGTERM, SIGALRM, or
//! SIGXCPU it exits through the signal's default disposition without any
//! in-flight cleanup. Partial output is acceptable. The optional time limit
//! is enforced with the process alarm timer, which delivers SIGALRM.

#![allow(unsafe_code)]

use signal_hook::consts::signal::{SIGALRM, SIGINT, SIGTERM, SIGXCPU};
use signal_hook::low_level;

/// Installs the terminating handlers.
///
/// # Errors
///
/// Propagates failures to register a handler.
pub fn install() -> std::io::Result<()> {
    for signal in [SIGINT, SIGTERM, SIGALRM, SIGXCPU] {
        // SAFETY: the handler only calls async-signal-safe routines; the
        // emulated default disposition terminates the process
        unsafe {
            low_level::register(signal, move || {
                let _ = low_level::emulate_default_handler(signal);
            })?;
        }
    }
    Ok(())
}

/// Arms the wall-clock limit; SIGALRM fires after `seconds`.
pub fn arm_timeout(seconds: u32) {
    // SAFETY: alarm only replaces the previous timer and cannot fail
    unsafe {
        libc::alarm(seconds);
    }
}
