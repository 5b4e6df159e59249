//! # Runtime Tunables
//!
//! The spec names a handful of fixed constants the original tsMuxer
//! hardcodes (`MIN_READED_BLOCK`, `MAX_DEMUX_BUFFER_SIZE`,
//! `INTERNAL_PTS_FREQ`). They are plain `const`s at [`crate`] scope for
//! normal use; this module exists so tests can override them (e.g. to
//! exercise the overflow guard without allocating 192 MiB) without
//! threading a parameter through every call site, the same env-var/file
//! override shape the original config module uses.

use lazy_static::lazy_static;
use std::env;
use std::sync::RwLock;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::from_env());
}

/// Overridable tunables. Defaults match the constants named in the spec.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Minimum bytes a Sequential-policy PID buffer accumulates before
    /// the adapter returns it to the consumer.
    pub min_readed_block: usize,
    /// Per-PID buffer size above which the overflow guard trips for
    /// non-MP4/MOV containers.
    pub max_demux_buffer_size: usize,
    /// Retry budget for the "every stream returned Delayed" cycle in the
    /// interleaver before it gives up rather than spin.
    pub max_delayed_retries: u32,
}

impl Config {
    fn from_env() -> Self {
        let mut config = Self {
            min_readed_block: crate::MIN_READED_BLOCK,
            max_demux_buffer_size: crate::MAX_DEMUX_BUFFER_SIZE,
            max_delayed_retries: crate::MAX_DELAYED_RETRIES,
        };

        if let Ok(v) = env::var("TSMUX_DEMUX_MIN_READED_BLOCK") {
            if let Ok(v) = v.parse() {
                config.min_readed_block = v;
            }
        }
        if let Ok(v) = env::var("TSMUX_DEMUX_MAX_BUFFER_SIZE") {
            if let Ok(v) = v.parse() {
                config.max_demux_buffer_size = v;
            }
        }
        if let Ok(v) = env::var("TSMUX_DEMUX_MAX_DELAYED_RETRIES") {
            if let Ok(v) = v.parse() {
                config.max_delayed_retries = v;
            }
        }
        config
    }

    /// Replaces the process-wide config (used by tests that need a small
    /// `max_demux_buffer_size` to exercise the overflow guard cheaply).
    pub fn install(config: Config) {
        if let Ok(mut guard) = CONFIG.write() {
            *guard = config;
        }
    }

    /// Restores defaults; intended for test teardown.
    pub fn reset() {
        Self::install(Self::from_env());
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_readed_block: crate::MIN_READED_BLOCK,
            max_demux_buffer_size: crate::MAX_DEMUX_BUFFER_SIZE,
            max_delayed_retries: crate::MAX_DELAYED_RETRIES,
        }
    }
}

/// Returns the process-wide configuration snapshot.
pub fn current() -> Config {
    *CONFIG.read().unwrap()
}
