//! Offering discovery and resolution.
//!
//! Offerings live as subdirectories of the offerings root, each with an
//! `offering.json`. Handler implementations are registered into the
//! registry at startup, keyed by logical offering name: the boot-time
//! equivalent of loading handler modules from each offering directory.

use crate::errors::{SellerError, SellerResult};
use crate::offering::OfferingHandlers;
use acp_types::OfferingConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub const OFFERING_CONFIG_FILE: &str = "offering.json";

/// Maps logical offering names to their config directory and registered
/// handler implementation. Configs are re-read on every load; the handler
/// map is the only cache.
pub struct OfferingRegistry {
    root: PathBuf,
    handlers: HashMap<String, Arc<dyn OfferingHandlers>>,
}

impl OfferingRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handlers: HashMap::new(),
        }
    }

    /// Register the handler implementation for an offering name.
    pub fn register(&mut self, name: impl Into<String>, handlers: Arc<dyn OfferingHandlers>) {
        self.handlers.insert(name.into(), handlers);
    }

    pub fn offerings_root(&self) -> &Path {
        &self.root
    }

    /// Immediate subdirectories of the offerings root, sorted.
    pub fn list_offerings(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    /// Resolve an offering by logical name to its parsed config and
    /// registered handlers.
    pub fn load_offering(
        &self,
        name: &str,
    ) -> SellerResult<(OfferingConfig, Arc<dyn OfferingHandlers>)> {
        let dir = self
            .resolve_dir(name)
            .ok_or_else(|| SellerError::OfferingNotConfigured {
                name: name.to_string(),
            })?;
        let config = Self::read_config(&dir)?;
        let handlers =
            self.handlers
                .get(&config.name)
                .cloned()
                .ok_or_else(|| SellerError::OfferingNotConfigured {
                    name: name.to_string(),
                })?;
        Ok((config, handlers))
    }

    /// Offerings that would survive a `load_offering` call: valid config
    /// and a registered handler set. Everything else is skipped with a
    /// warning. Intended for the startup scan.
    pub fn available_offerings(&self) -> Vec<String> {
        self.list_offerings()
            .into_iter()
            .filter(|dir_name| {
                let dir = self.root.join(dir_name);
                let config = match Self::read_config(&dir) {
                    Ok(config) => config,
                    Err(err) => {
                        warn!(
                            component = "registry",
                            offering = %dir_name,
                            error = %err,
                            "skipping offering with invalid config"
                        );
                        return false;
                    }
                };
                if !self.handlers.contains_key(&config.name) {
                    warn!(
                        component = "registry",
                        offering = %config.name,
                        "skipping offering without a registered executeJob handler"
                    );
                    return false;
                }
                true
            })
            .collect()
    }

    /// Direct directory-name match first; otherwise scan every
    /// subdirectory's config for a matching logical name.
    fn resolve_dir(&self, name: &str) -> Option<PathBuf> {
        let direct = self.root.join(name);
        if direct.join(OFFERING_CONFIG_FILE).is_file() {
            return Some(direct);
        }
        self.list_offerings().into_iter().find_map(|dir_name| {
            let dir = self.root.join(&dir_name);
            match Self::read_config(&dir) {
                Ok(config) if config.name == name => Some(dir),
                _ => None,
            }
        })
    }

    fn read_config(dir: &Path) -> SellerResult<OfferingConfig> {
        let path = dir.join(OFFERING_CONFIG_FILE);
        let body = std::fs::read_to_string(&path).map_err(|e| SellerError::OfferingConfig {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: OfferingConfig =
            serde_json::from_str(&body).map_err(|e| SellerError::OfferingConfig {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if config.name.trim().is_empty() {
            return Err(SellerError::OfferingConfig {
                path: path.display().to_string(),
                reason: "offering name cannot be empty".to_string(),
            });
        }
        Ok(config)
    }
}
