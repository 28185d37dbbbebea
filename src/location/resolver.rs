//! Location resolver: runs the provider chain and remembers the answer.
//!
//! Chain: explicit coordinates → built-in city → IP lookup (skipped
//! offline) → last stored location → error.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::providers::{BuiltinProvider, IpProvider, LocationProvider, ManualProvider, StoredProvider};
use super::types::{LocationError, LocationQuery, LocationSource, ResolvedLocation};
use crate::store::{self, KeyValueStore};

pub struct LocationResolver {
    providers: Vec<Box<dyn LocationProvider>>,
    store: Arc<dyn KeyValueStore>,
}

impl LocationResolver {
    /// The standard chain. `offline` drops the network provider.
    pub fn new(store: Arc<dyn KeyValueStore>, offline: bool) -> Self {
        let mut providers: Vec<Box<dyn LocationProvider>> = vec![Box::new(ManualProvider), Box::new(BuiltinProvider)];
        if !offline {
            providers.push(Box::new(IpProvider));
        }
        providers.push(Box::new(StoredProvider::new(store.clone())));
        Self { providers, store }
    }

    /// A resolver over a custom chain.
    pub fn with_providers(store: Arc<dyn KeyValueStore>, providers: Vec<Box<dyn LocationProvider>>) -> Self {
        Self { providers, store }
    }

    /// Resolve `query`. Fresh results are saved under `user_location`;
    /// failing to save is logged, not returned.
    pub fn resolve(&self, query: &LocationQuery) -> Result<ResolvedLocation, LocationError> {
        for provider in &self.providers {
            match provider.resolve(query) {
                Ok(Some(location)) => {
                    info!(provider = provider.name(), location = %location.display_name(), "location resolved");
                    self.remember(&location);
                    return Ok(location);
                }
                Ok(None) => debug!(provider = provider.name(), "provider not applicable"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(provider = provider.name(), error = %e, "provider failed, trying next"),
            }
        }
        Err(LocationError::NoInput)
    }

    fn remember(&self, location: &ResolvedLocation) {
        if location.source == LocationSource::Stored {
            return;
        }
        if let Err(e) = store::set_as(self.store.as_ref(), store::USER_LOCATION, location) {
            warn!(error = %e, "could not save location");
        }
    }
}
