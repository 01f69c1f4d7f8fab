//! Fault isolation for extension calls.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

/// Runs one extension call; a panic is logged and replaced by `fallback`.
///
/// The extension may have been left half-updated by the panic. It keeps
/// running regardless: one broken hook must not stop the arena.
pub(crate) fn guard<R>(
    arena: &str,
    extension: &str,
    hook: &'static str,
    fallback: R,
    call: impl FnOnce() -> R,
) -> R {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => value,
        Err(payload) => {
            error!(
                arena,
                extension,
                hook,
                reason = panic_message(payload.as_ref()),
                "extension hook panicked"
            );
            fallback
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
