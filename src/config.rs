//! Configuration for the compute backend
//!
//! This module defines [`BackendConfig`] which sizes the execution groups
//! kernels are launched with and selects the worker pool they run on.

use std::env;

use crate::error::{ForgeError, ForgeResult};

/// Environment variable overriding [`BackendConfig::subgroup_size`]
pub const ENV_SUBGROUP_SIZE: &str = "TENSORFORGE_SUBGROUP_SIZE";
/// Environment variable overriding [`BackendConfig::max_local_size`]
pub const ENV_MAX_LOCAL_SIZE: &str = "TENSORFORGE_MAX_LOCAL_SIZE";
/// Environment variable overriding [`BackendConfig::num_threads`]
pub const ENV_NUM_THREADS: &str = "TENSORFORGE_NUM_THREADS";

/// Configuration for kernel launches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Lanes per group-norm execution group
    pub subgroup_size: usize,

    /// Largest number of lanes (and local memory cells) one work-group may
    /// use. Bounds the padded row length accepted by argsort.
    pub max_local_size: usize,

    /// Worker threads for a dedicated pool; `None` uses rayon's global pool
    pub num_threads: Option<usize>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            subgroup_size: 32,
            max_local_size: 1024,
            num_threads: None,
        }
    }
}

fn parse_env(name: &str) -> ForgeResult<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<usize>().map(Some).map_err(|e| {
            ForgeError::InvalidConfiguration(format!("{}={:?}: {}", name, raw, e))
        }),
        Err(_) => Ok(None),
    }
}

impl BackendConfig {
    /// Create a new backend config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TENSORFORGE_*` environment variables.
    ///
    /// The result is validated; unparsable values are an error.
    pub fn from_env() -> ForgeResult<Self> {
        let mut config = Self::default();
        if let Some(size) = parse_env(ENV_SUBGROUP_SIZE)? {
            config.subgroup_size = size;
        }
        if let Some(size) = parse_env(ENV_MAX_LOCAL_SIZE)? {
            config.max_local_size = size;
        }
        if let Some(threads) = parse_env(ENV_NUM_THREADS)? {
            config.num_threads = Some(threads);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set lanes per group-norm execution group
    pub fn with_subgroup_size(mut self, subgroup_size: usize) -> Self {
        self.subgroup_size = subgroup_size;
        self
    }

    /// Set maximum work-group size
    pub fn with_max_local_size(mut self, max_local_size: usize) -> Self {
        self.max_local_size = max_local_size;
        self
    }

    /// Run kernels on a dedicated pool with `num_threads` workers
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn validate(&self) -> ForgeResult<()> {
        for (name, value) in [
            ("subgroup_size", self.subgroup_size),
            ("max_local_size", self.max_local_size),
        ] {
            if !value.is_power_of_two() {
                return Err(ForgeError::InvalidConfiguration(format!(
                    "{} must be a non-zero power of two, got {}",
                    name, value
                )));
            }
        }
        if self.subgroup_size > self.max_local_size {
            return Err(ForgeError::InvalidConfiguration(format!(
                "subgroup_size {} exceeds max_local_size {}",
                self.subgroup_size, self.max_local_size
            )));
        }
        if self.num_threads == Some(0) {
            return Err(ForgeError::InvalidConfiguration(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
