use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::runtime::{RuntimeError, RuntimeResult, TYPES};

/// Process-wide engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum operand stack depth of a single frame.
    pub max_stack_size: usize,
    /// Maximum number of nested bytecode frames per thread.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_size: default_max_stack_size(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

fn default_max_stack_size() -> usize {
    1024
}

fn default_max_call_depth() -> usize {
    256
}

impl VmConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: VmConfig = toml::from_str(raw).context("invalid VM configuration")?;
        if config.max_stack_size == 0 || config.max_call_depth == 0 {
            anyhow::bail!("VM limits must be positive");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize VM configuration")
    }
}

static CONFIG: OnceLock<VmConfig> = OnceLock::new();

/// Installs the process-wide configuration and builds the type registry.
///
/// Succeeds once; later calls, or a call after [`config`] has already fallen back to
/// the defaults, fail with [`RuntimeError::AlreadyInitialized`].
pub fn init(config: VmConfig) -> RuntimeResult<()> {
    CONFIG
        .set(config)
        .map_err(|_| RuntimeError::AlreadyInitialized)?;
    lazy_static::initialize(&TYPES);
    debug!(config = ?CONFIG.get(), "runtime initialized");
    Ok(())
}

/// The active configuration, defaulting on first use when [`init`] was never called.
pub fn config() -> &'static VmConfig {
    CONFIG.get_or_init(|| {
        debug!("runtime not initialized, using default limits");
        VmConfig::default()
    })
}
