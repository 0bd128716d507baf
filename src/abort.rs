//! Cooperative cancellation and the process signal hook that triggers it.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Arc;

/// Shared flag the verifier polls between chunks.
#[derive(Debug, Clone, Default)]
pub(crate) struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request a stop. An in-flight read still runs to completion.
    pub(crate) fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_signalled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handle the installed handler signals; owns one leaked clone.
static SIGNAL_TARGET: AtomicPtr<AbortHandle> = AtomicPtr::new(ptr::null_mut());

const HANDLED_SIGNALS: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

extern "C" fn handle_signal(_signal: libc::c_int) {
    let target = SIGNAL_TARGET.load(Ordering::SeqCst);
    if !target.is_null() {
        // `signal` is a single atomic store, which is async-signal-safe.
        unsafe { (*target).signal() };
    }
}

/// Route SIGINT and SIGTERM to `handle`.
pub(crate) fn attach(handle: &AbortHandle) -> io::Result<()> {
    let raw = Box::into_raw(Box::new(handle.clone()));
    release(SIGNAL_TARGET.swap(raw, Ordering::SeqCst));
    let handler = handle_signal as extern "C" fn(libc::c_int) as *const () as libc::sighandler_t;
    for signal in HANDLED_SIGNALS {
        set_disposition(signal, handler)?;
    }
    Ok(())
}

/// Restore default dispositions and drop the handler's handle.
pub(crate) fn detach() -> io::Result<()> {
    let mut result = Ok(());
    for signal in HANDLED_SIGNALS {
        if let Err(err) = set_disposition(signal, libc::SIG_DFL) {
            result = Err(err);
        }
    }
    release(SIGNAL_TARGET.swap(ptr::null_mut(), Ordering::SeqCst));
    result
}

fn release(previous: *mut AbortHandle) {
    if !previous.is_null() {
        unsafe { drop(Box::from_raw(previous)) };
    }
}

fn set_disposition(signal: libc::c_int, handler: libc::sighandler_t) -> io::Result<()> {
    if unsafe { libc::signal(signal, handler) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
