//! Reads host configuration from the real process environment.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use gantry_config::{CALL_TIMEOUT_ENV, ConfigError, HostConfig, SHUTDOWN_GRACE_ENV};
use once_cell::sync::Lazy;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<String>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvOverride {
    fn set(key: &'static str, value: &str) -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = std::env::var(key).ok();
        // Environment mutation is unsafe under edition 2024; the mutex keeps
        // tests in this binary from racing each other.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

#[test]
fn call_timeout_is_read_from_the_environment() {
    let _override = EnvOverride::set(CALL_TIMEOUT_ENV, "250");
    let config = HostConfig::from_env().expect("valid environment");
    assert_eq!(config.call_timeout, Some(Duration::from_millis(250)));
}

#[test]
fn malformed_grace_period_is_reported() {
    let _override = EnvOverride::set(SHUTDOWN_GRACE_ENV, "later");
    let err = HostConfig::from_env().expect_err("malformed grace period");
    assert!(matches!(
        err,
        ConfigError::InvalidMillis { variable, .. } if variable == SHUTDOWN_GRACE_ENV
    ));
}
