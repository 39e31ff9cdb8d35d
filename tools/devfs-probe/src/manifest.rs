//! Device manifest
//!
//! A TOML description of the drivers a board registers at boot, plus
//! optional registry limits.

use anyhow::{bail, Context, Result};
use kaal_devfs::{Capability, NodeRegistry, RegistryConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::stub;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default, rename = "driver")]
    pub drivers: Vec<DriverEntry>,
}

/// Overrides for [`RegistryConfig`]; unset fields keep the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    pub max_nodes: Option<usize>,
    pub max_path_len: Option<usize>,
    pub max_name_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverEntry {
    pub path: String,
    pub kind: String,
    /// Device size in blocks, for block and MTD stubs
    pub blocks: Option<usize>,
}

impl DriverEntry {
    pub fn capability(&self) -> Result<Capability> {
        match Capability::from_name(&self.kind) {
            Some(capability) => Ok(capability),
            None => bail!("{}: unknown driver kind '{}'", self.path, self.kind),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text)?;
        for entry in &manifest.drivers {
            entry.capability()?;
        }
        Ok(manifest)
    }

    pub fn config(&self) -> RegistryConfig {
        let defaults = RegistryConfig::default();
        RegistryConfig {
            max_nodes: self.registry.max_nodes.unwrap_or(defaults.max_nodes),
            max_path_len: self.registry.max_path_len.unwrap_or(defaults.max_path_len),
            max_name_len: self.registry.max_name_len.unwrap_or(defaults.max_name_len),
        }
    }

    /// Build a registry and register every driver entry with a stub driver
    pub fn populate(&self) -> Result<NodeRegistry> {
        let registry = NodeRegistry::new(self.config());

        for entry in &self.drivers {
            let capability = entry.capability()?;
            let payload = stub::payload(capability, entry.blocks);
            registry
                .register(&entry.path, payload)
                .with_context(|| format!("Failed to register {}", entry.path))?;
            log::debug!("registered {} driver at {}", capability, entry.path);
        }

        log::info!("Registered {} drivers", registry.len());
        Ok(registry)
    }
}
