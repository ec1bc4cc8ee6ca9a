//! Test utilities for environment-dependent code.
//!
//! The process environment is global, so tests that set or remove
//! variables race each other and any concurrent resolution. [`EnvGuard`]
//! serializes such tests behind one process-wide lock and rolls every
//! mutation back when dropped.

use std::env;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Holds the environment lock and records prior state for rollback.
///
/// ```
/// use envcast::testing::EnvGuard;
///
/// let mut guard = EnvGuard::lock();
/// guard.set("DEMO_VAR", "1");
/// // DEMO_VAR is restored to its previous state when `guard` drops.
/// ```
pub struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Take the lock without touching any variable yet.
    pub fn lock() -> Self {
        // A panicking test poisons the lock; the environment state it
        // guards is still consistent because Drop ran the rollback.
        let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: Vec::new(),
            _lock: lock,
        }
    }

    /// Take the lock and set every `(name, value)` pair.
    pub fn with_vars(vars: &[(&str, &str)]) -> Self {
        let mut guard = Self::lock();
        for (name, value) in vars {
            guard.set(name, value);
        }
        guard
    }

    /// Set a variable, remembering its previous state.
    pub fn set(&mut self, name: &str, value: &str) {
        self.save(name);
        set_var(name, value);
    }

    /// Remove a variable, remembering its previous state.
    pub fn remove(&mut self, name: &str) {
        self.save(name);
        remove_var(name);
    }

    fn save(&mut self, name: &str) {
        if self.saved.iter().any(|(saved, _)| saved == name) {
            return;
        }
        self.saved.push((name.to_string(), env::var(name).ok()));
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => set_var(&name, &value),
                None => remove_var(&name),
            }
        }
    }
}

#[allow(unsafe_code)]
fn set_var(name: &str, value: &str) {
    // SAFETY: callers hold ENV_LOCK (the guard owns it for its whole
    // lifetime, including Drop), so no other guarded code touches the
    // environment concurrently.
    unsafe { env::set_var(name, value) };
}

#[allow(unsafe_code)]
fn remove_var(name: &str) {
    // SAFETY: see set_var.
    unsafe { env::remove_var(name) };
}
