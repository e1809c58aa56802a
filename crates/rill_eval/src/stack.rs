//! Stack growth for deeply nested expressions.
//!
//! Recursive descent over a hostile, deeply right-nested script can blow
//! the native stack; `stacker` grows it on demand instead.

/// Run `f`, growing the stack first if the red zone is breached.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn with_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Remaining stack that triggers a grow (64 KiB).
    const RED_ZONE: usize = 64 * 1024;

    /// Size of each additional stack segment (2 MiB).
    const GROW_BY: usize = 2 * 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, GROW_BY, f)
}

/// WASM manages its own stack; call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn with_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
