//! Provider adapter lookup by tag.

use crate::sync::domain::Provider;
use crate::sync::ports::ProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// Adapters keyed by the provider tag stored on integrations.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under the provider it reports, replacing any
    /// previous adapter for that provider.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    /// Returns the adapter for `provider`.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Returns the registered providers in tag order.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}
