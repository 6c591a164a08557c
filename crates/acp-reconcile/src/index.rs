use std::collections::BTreeMap;

use acp_api::App;
use tracing::warn;

use crate::types::CompositeKey;

/// Remote applications keyed by exact name.
///
/// Seeded from the organization listing at run start, then grown with every
/// application the run creates. A name already present is never replaced by
/// the seed; a creation always records under its composite key.
#[derive(Debug, Clone, Default)]
pub struct ApplicationIndex {
    apps: BTreeMap<String, App>,
}

impl ApplicationIndex {
    pub fn from_listing(listing: Vec<App>) -> Self {
        let mut apps = BTreeMap::new();
        for app in listing {
            if apps.contains_key(&app.name) {
                warn!(name = %app.name, "duplicate application name in listing; keeping first");
                continue;
            }
            apps.insert(app.name.clone(), app);
        }
        Self { apps }
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&App> {
        self.apps.get(key.as_str())
    }

    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.apps.contains_key(key.as_str())
    }

    /// Record a created application. Returns the previous entry, if any.
    pub fn insert(&mut self, key: &CompositeKey, app: App) -> Option<App> {
        self.apps.insert(key.as_str().to_string(), app)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Indexed names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }
}
