//! Remote records and their status projections

use std::str::FromStr;

use odb_core::provider::{ProviderError, ProviderResult};
use serde::Deserialize;

use crate::api::OdbApi;
use crate::resources::ResourceKind;
use crate::status::{ManagedResourceStatus, ResourceStatus};

/// A resource as last reported by the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: ResourceKind,
    pub identifier: String,
    pub properties: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatusFields {
    status: Option<String>,
    status_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagedServices {
    s3_access: Option<ServiceAccess>,
    zero_etl_access: Option<ServiceAccess>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceAccess {
    status: Option<String>,
}

/// Capabilities of an ODB network that are enabled and disabled on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedService {
    S3Access,
    ZeroEtlAccess,
}

impl ManagedService {
    /// In the order they are waited on
    pub const ALL: [ManagedService; 2] = [ManagedService::S3Access, ManagedService::ZeroEtlAccess];

    /// Configuration attribute toggling this service
    pub fn attribute(&self) -> &'static str {
        match self {
            ManagedService::S3Access => "s3_access",
            ManagedService::ZeroEtlAccess => "zero_etl_access",
        }
    }
}

impl std::fmt::Display for ManagedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedService::S3Access => f.write_str("S3 access"),
            ManagedService::ZeroEtlAccess => f.write_str("Zero-ETL access"),
        }
    }
}

impl Record {
    pub fn new(kind: ResourceKind, identifier: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    fn status_fields(&self) -> StatusFields {
        StatusFields::deserialize(&self.properties).unwrap_or_default()
    }

    /// Top-level lifecycle status
    pub fn status(&self) -> ProviderResult<ResourceStatus> {
        let raw = self.status_fields().status.ok_or_else(|| {
            ProviderError::new(format!("{} {} reports no status", self.kind, self.identifier))
        })?;
        ResourceStatus::from_str(&raw).map_err(|e| ProviderError::new(e.to_string()))
    }

    /// Remote explanation for the current status, if any
    pub fn status_reason(&self) -> Option<String> {
        self.status_fields().status_reason
    }

    /// Status of one managed service embedded in an ODB network
    pub fn managed_service_status(
        &self,
        service: ManagedService,
    ) -> ProviderResult<ManagedResourceStatus> {
        let services = self
            .property("ManagedServices")
            .map(ManagedServices::deserialize)
            .transpose()
            .map_err(|e| ProviderError::new(format!("Invalid managed services: {}", e)))?
            .unwrap_or_default();

        let access = match service {
            ManagedService::S3Access => services.s3_access,
            ManagedService::ZeroEtlAccess => services.zero_etl_access,
        };

        let raw = access.and_then(|a| a.status).ok_or_else(|| {
            ProviderError::new(format!(
                "{} {} reports no {} status",
                self.kind, self.identifier, service
            ))
        })?;
        ManagedResourceStatus::from_str(&raw).map_err(|e| ProviderError::new(e.to_string()))
    }
}

/// Fetch the current record for `identifier`
pub async fn find_record(
    api: &dyn OdbApi,
    kind: ResourceKind,
    identifier: &str,
) -> ProviderResult<Record> {
    let properties = api.get_resource(kind, identifier).await?;
    Ok(Record::new(kind, identifier, properties))
}

/// Identifier of a data source record nested under its parent
pub fn child_identifier(parent_id: &str, id: &str) -> String {
    format!("{}|{}", parent_id, id)
}
