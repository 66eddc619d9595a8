//! SIGINT wiring for the runner's cancellation token.
//!
//! The runner only checks cancellation at step boundaries, never
//! mid-install, so an interrupt can never leave a step half-applied. The
//! handler does a single atomic store; no allocation in signal context.

use provision::CancelToken;
use std::sync::OnceLock;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_sigint(_signal: libc::c_int) {
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
}

/// Install the SIGINT handler and return the token it cancels.
///
/// Idempotent: repeated calls return clones of the same token.
pub fn install_handler() -> CancelToken {
    let token = TOKEN.get_or_init(CancelToken::new).clone();
    // SAFETY: on_sigint is async-signal-safe (one atomic store through an
    // already-initialized OnceLock).
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
    token
}
