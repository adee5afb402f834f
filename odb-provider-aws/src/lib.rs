//! Oracle Database@AWS Provider
//!
//! Manages Exadata infrastructure, VM clusters, ODB networks and peering
//! connections over the AWS Cloud Control API, and reads DB servers and DB
//! nodes as data sources.
//!
//! ## Module Structure
//!
//! - `api` - Control plane seam and its Cloud Control implementation
//! - `provider` - OdbProvider implementation
//! - `record` - Remote records and status projections
//! - `resources` - Resource type definitions and configurations
//! - `status` - Closed status vocabularies
//! - `utils` - Helper functions for value normalization
//! - `wait` - Created/updated/deleted and managed-service waits

pub mod api;
pub mod provider;
pub mod record;
pub mod resources;
pub mod status;
pub mod utils;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-export main types
pub use api::{CloudControlApi, OdbApi};
pub use provider::OdbProvider;
pub use record::{ManagedService, Record};
pub use resources::ResourceKind;
pub use wait::Phase;

use odb_core::provider::{BoxFuture, Provider, ProviderResult};
use odb_core::resource::{Resource, ResourceId, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for OdbProvider {
    fn normalize(&self, resource: &Resource) -> Resource {
        self.normalize_resource(resource)
    }

    fn requires_replacement(&self, id: &ResourceId, attribute: &str) -> bool {
        OdbProvider::requires_replacement(self, id, attribute)
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(id, &identifier, &from, to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
