//! Provider - Trait abstracting resource operations
//!
//! A Provider maps declared resources onto a remote control plane.
//! It is responsible for turning create/read/update/delete requests into
//! API calls and for waiting until the remote side has settled.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};

/// Classification of a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The remote resource does not exist (or is not visible yet)
    NotFound,
    /// The operation ran out of time while the remote side was still working.
    /// The resource may still settle later.
    Timeout,
    /// Any other failure
    Other,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub kind: ProviderErrorKind,
    pub resource_id: Option<ResourceId>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ProviderErrorKind::Other,
            resource_id: None,
        }
    }

    /// Error reporting that the remote resource could not be found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::NotFound,
            ..Self::new(message)
        }
    }

    /// Error reporting that a wait gave up before the resource settled
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            ..Self::new(message)
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ProviderErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ProviderErrorKind::Timeout
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
///
/// All operations are async and involve side effects. Mutating operations
/// return only once the remote resource has settled.
pub trait Provider: Send + Sync {
    /// Rewrite declared attribute values into the form the remote side
    /// reports them in, so a declared resource compares equal to its state
    fn normalize(&self, resource: &Resource) -> Resource {
        resource.clone()
    }

    /// Whether changing `attribute` of an existing resource needs the
    /// resource to be deleted and created again
    fn requires_replacement(&self, _id: &ResourceId, _attribute: &str) -> bool {
        false
    }

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist or no
    /// identifier is known yet.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the remote ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}
