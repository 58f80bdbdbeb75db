//! Loads a JSON seed file into an [`InMemoryConfigStore`] at startup.
//! Entirely optional — without `--seed`, the store starts empty and every
//! request fails `NoMatchingRoute` until an embedder wires real config.

use std::path::Path;

use serde::Deserialize;

use aicodeswitch_storage::{AppConfig, ApiService, InMemoryConfigStore, Route, Rule, Vendor};

#[derive(Debug, Deserialize, Default)]
struct SeedFile {
    #[serde(default)]
    vendors: Vec<Vendor>,
    #[serde(default)]
    services: Vec<ApiService>,
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    app_config: Option<AppConfig>,
}

pub fn load(path: &Path) -> anyhow::Result<InMemoryConfigStore> {
    let raw = std::fs::read_to_string(path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;

    let mut store = InMemoryConfigStore::new();
    if let Some(app_config) = seed.app_config {
        store = store.with_app_config(app_config);
    }
    for vendor in seed.vendors {
        store.add_vendor(vendor);
    }
    for service in seed.services {
        store.add_service(service);
    }
    for route in seed.routes {
        store.add_route(route);
    }
    for rule in seed.rules {
        store.add_rule(rule);
    }

    Ok(store)
}
