//! Site code → plugin resolution.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{bid_board, council_minutes, dynamic_list, standard_table};
use super::{BidBoard, BoardPlugin, CouncilMinutes, DynamicList, StandardTable};
use crate::config::SiteDescriptor;
use crate::error::{HarvestError, Result};

/// Builds a plugin instance for one site.
pub type PluginCtor = fn(&SiteDescriptor) -> Arc<dyn BoardPlugin>;

fn new_standard_table(site: &SiteDescriptor) -> Arc<dyn BoardPlugin> {
    Arc::new(StandardTable::new(site))
}

fn new_bid_board(site: &SiteDescriptor) -> Arc<dyn BoardPlugin> {
    Arc::new(BidBoard::new(site))
}

fn new_council_minutes(site: &SiteDescriptor) -> Arc<dyn BoardPlugin> {
    Arc::new(CouncilMinutes::new(site))
}

fn new_dynamic_list(site: &SiteDescriptor) -> Arc<dyn BoardPlugin> {
    Arc::new(DynamicList::new(site))
}

/// Plugins compiled into the binary.
pub const BUILTIN_PLUGINS: &[(&str, PluginCtor)] = &[
    (standard_table::NAME, new_standard_table),
    (bid_board::NAME, new_bid_board),
    (council_minutes::NAME, new_council_minutes),
    (dynamic_list::NAME, new_dynamic_list),
];

/// Resolves configured sites to plugin instances.
///
/// A constructor registered under a site code takes precedence over the
/// site's `plugin_name`. Resolved plugins are cached per site.
pub struct PluginRegistry {
    ctors: BTreeMap<String, PluginCtor>,
    sites: BTreeMap<String, SiteDescriptor>,
    cache: Mutex<HashMap<String, Arc<dyn BoardPlugin>>>,
}

impl PluginRegistry {
    /// Empty registry with no plugins and no sites.
    pub fn new() -> Self {
        Self {
            ctors: BTreeMap::new(),
            sites: BTreeMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with the built-in plugins and the given sites.
    pub fn with_builtin(sites: impl IntoIterator<Item = SiteDescriptor>) -> Self {
        let mut registry = Self::new();
        for (name, ctor) in BUILTIN_PLUGINS {
            registry.register(name, *ctor);
        }
        for site in sites {
            registry.add_site(site);
        }
        registry
    }

    /// Register a plugin under a plugin name or a site code.
    pub fn register(&mut self, name: &str, ctor: PluginCtor) {
        self.ctors.insert(name.to_string(), ctor);
        self.clear_cache();
    }

    pub fn add_site(&mut self, site: SiteDescriptor) {
        self.sites.insert(site.code.clone(), site);
        self.clear_cache();
    }

    fn clear_cache(&mut self) {
        if let Ok(cache) = self.cache.get_mut() {
            cache.clear();
        }
    }

    /// Registered plugin names, sorted. Per-site overrides are not
    /// plugin names and are left out.
    pub fn list_available(&self) -> Vec<&str> {
        self.ctors
            .keys()
            .filter(|name| !self.sites.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Configured sites, sorted by code.
    pub fn sites(&self) -> impl Iterator<Item = &SiteDescriptor> {
        self.sites.values()
    }

    /// Descriptor of a configured site.
    pub fn load_config(&self, code: &str) -> Result<&SiteDescriptor> {
        self.sites
            .get(code)
            .ok_or_else(|| HarvestError::PluginNotFound(code.to_string()))
    }

    /// Plugin for a site code.
    pub fn resolve(&self, code: &str) -> Result<Arc<dyn BoardPlugin>> {
        if let Some(plugin) = self.cache.lock().ok().and_then(|c| c.get(code).cloned()) {
            return Ok(plugin);
        }

        let site = self.load_config(code)?;
        let ctor = self
            .ctors
            .get(code)
            .or_else(|| self.ctors.get(site.plugin_name.as_str()))
            .ok_or_else(|| HarvestError::PluginNotFound(format!("{} ({})", code, site.plugin_name)))?;

        debug!("Resolved {} to plugin {}", code, site.plugin_name);
        let plugin = ctor(site);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(code.to_string(), plugin.clone());
        }
        Ok(plugin)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
