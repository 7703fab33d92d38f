//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the ncmdarray crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Deflate Level
/// > default: `1`
///
/// The compression level used when deflate compression is requested at array creation without a valid
/// explicit level (see [`ArrayCreateOptions`](crate::array::ArrayCreateOptions)).
///
/// ## Read-Ahead Maximum Bytes
/// > default: `268435456` (256 MiB)
///
/// The largest region, in bytes of the array data type, that [`Array::advise_read`](crate::array::Array::advise_read)
/// will materialise in memory. Larger requests are declined and no read-ahead cache is built.
#[derive(Debug)]
pub struct Config {
    deflate_level: u32,
    read_ahead_max_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            deflate_level: 1,
            read_ahead_max_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Get the [deflate level](#deflate-level) configuration.
    #[must_use]
    pub fn deflate_level(&self) -> u32 {
        self.deflate_level
    }

    /// Set the [deflate level](#deflate-level) configuration.
    ///
    /// Levels outside `1..=9` are clamped into that range.
    pub fn set_deflate_level(&mut self, deflate_level: u32) {
        self.deflate_level = deflate_level.clamp(1, 9);
    }

    /// Get the [read-ahead maximum bytes](#read-ahead-maximum-bytes) configuration.
    #[must_use]
    pub fn read_ahead_max_bytes(&self) -> usize {
        self.read_ahead_max_bytes
    }

    /// Set the [read-ahead maximum bytes](#read-ahead-maximum-bytes) configuration.
    pub fn set_read_ahead_max_bytes(&mut self, read_ahead_max_bytes: usize) {
        self.read_ahead_max_bytes = read_ahead_max_bytes;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global ncmdarray configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global ncmdarray configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deflate_level() {
        assert_eq!(global_config().deflate_level(), 1);
        let mut config = Config::default();
        config.set_deflate_level(12);
        assert_eq!(config.deflate_level(), 9);
        config.set_deflate_level(0);
        assert_eq!(config.deflate_level(), 1);
    }

    #[test]
    fn config_read_ahead_max_bytes() {
        let mut config = Config::default();
        assert_eq!(config.read_ahead_max_bytes(), 256 * 1024 * 1024);
        config.set_read_ahead_max_bytes(0);
        assert_eq!(config.read_ahead_max_bytes(), 0);
    }
}
