//! Oracle Database@AWS provider implementation
//!
//! Handlers map declared resources onto control-plane calls, wait for the
//! remote side to settle, and reconcile the settled record into a [`State`].

use std::collections::HashMap;

use log::{debug, info, warn};
use odb_core::config::WaitConfig;
use odb_core::differ::find_changed_attributes;
use odb_core::provider::{ProviderError, ProviderResult};
use odb_core::resource::{Resource, ResourceId, State, Value};
use odb_core::wait::{Convergence, Deadline};
use serde_json::json;

use crate::api::{CloudControlApi, OdbApi};
use crate::record::{ManagedService, Record, child_identifier, find_record};
use crate::resources::{ResourceConfig, ResourceKind};
use crate::status::ManagedResourceStatus;
use crate::utils::{normalize_availability_zone, normalize_region};
use crate::wait::{Phase, wait_for_phase, wait_managed_services};

/// Oracle Database@AWS Provider
pub struct OdbProvider {
    api: Box<dyn OdbApi>,
    config: WaitConfig,
}

impl OdbProvider {
    /// Create a new OdbProvider for the specified region
    pub async fn new(region: &str, config: WaitConfig) -> Self {
        let api = CloudControlApi::new(&normalize_region(region)).await;
        Self::with_api(Box::new(api), config)
    }

    /// Create with a specific API (for testing)
    pub fn with_api(api: Box<dyn OdbApi>, config: WaitConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    fn kind_for(id: &ResourceId) -> ProviderResult<ResourceKind> {
        ResourceKind::from_resource_type(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                .for_resource(id.clone())
        })
    }

    fn managed_kind_for(id: &ResourceId) -> ProviderResult<ResourceKind> {
        let kind = Self::kind_for(id)?;
        if kind.is_data_source() {
            return Err(ProviderError::new(format!(
                "{} is a data source and cannot be modified",
                kind
            ))
            .for_resource(id.clone()));
        }
        Ok(kind)
    }

    /// Whether changing `attribute` needs the resource to be recreated
    pub fn requires_replacement(&self, id: &ResourceId, attribute: &str) -> bool {
        ResourceKind::from_resource_type(&id.resource_type)
            .and_then(|kind| kind.config().attribute(attribute))
            .is_some_and(|&(_, _, updatable)| !updatable)
    }

    /// Rewrite declared values into the form the control plane reports
    /// them in
    pub fn normalize_resource(&self, resource: &Resource) -> Resource {
        let mut normalized = resource.clone();
        for (name, value) in normalized.attributes.iter_mut() {
            *value = normalize_value(name, value);
        }
        normalized
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource by its remote identifier
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let kind = Self::kind_for(id)?;

        let identifier = match identifier {
            Some(identifier) => identifier,
            None => return Ok(State::not_found(id.clone())),
        };

        match find_record(self.api.as_ref(), kind, identifier).await {
            Ok(record) => Ok(self.state_from_record(id, &record)),
            Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
            Err(e) => Err(e.for_resource(id.clone())),
        }
    }

    /// Look up a data source from its declared attributes: the parent's
    /// identifier and the record's own `id`
    pub async fn read_data_source(&self, resource: &Resource) -> ProviderResult<State> {
        let kind = Self::kind_for(&resource.id)?;
        let (parent_attr, _) = kind.config().parent_identifier.ok_or_else(|| {
            ProviderError::new(format!("{} is not a data source", kind))
                .for_resource(resource.id.clone())
        })?;

        let lookup = |name: &str| {
            resource
                .attributes
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::new(format!("Missing required attribute: {}", name))
                        .for_resource(resource.id.clone())
                })
        };
        let identifier = child_identifier(lookup(parent_attr)?, lookup("id")?);

        let state = self.read_resource(&resource.id, Some(&identifier)).await?;
        if !state.exists {
            return Err(
                ProviderError::not_found(format!("{} {} not found", kind, identifier))
                    .for_resource(resource.id.clone()),
            );
        }
        Ok(state)
    }

    /// Create a resource and wait until it is available
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let resource = self.normalize_resource(&resource);
        let id = resource.id.clone();
        let kind = Self::managed_kind_for(&id)?;
        let config = kind.config();

        let desired_state = self.desired_properties(config, &resource);
        let requested = if kind == ResourceKind::OdbNetwork {
            requested_services(&resource.attributes, ManagedService::ALL.iter().copied())
                .map_err(|e| e.for_resource(id.clone()))?
        } else {
            Vec::new()
        };

        info!("Creating {}", id);
        let deadline = Deadline::after(Phase::Created.timeout(&self.config));
        let identifier = self
            .api
            .create_resource(kind, serde_json::Value::Object(desired_state), deadline)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let record = self
            .wait_settled(&id, kind, &identifier, Phase::Created, deadline)
            .await?;
        let record = self
            .wait_services(&id, &identifier, &requested, deadline)
            .await?
            .unwrap_or(record);

        Ok(self.state_from_record(&id, &record))
    }

    /// Update a resource in place and wait until it is available again
    pub async fn update_resource(
        &self,
        id: ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let kind = Self::managed_kind_for(&id)?;
        let config = kind.config();
        let to = self.normalize_resource(&to);

        let changed = find_changed_attributes(&to.attributes, &from.attributes);
        let mut patch_ops = Vec::new();
        for name in &changed {
            let Some(&(dsl_name, aws_name, updatable)) = config.attribute(name) else {
                warn!("Ignoring unknown attribute {} on {}", name, id);
                continue;
            };
            if !updatable {
                return Err(ProviderError::new(format!(
                    "{} cannot be updated in place, delete and recreate",
                    dsl_name
                ))
                .for_resource(id));
            }
            if let Some(value) = to.attributes.get(dsl_name) {
                // "add" also replaces an existing member
                patch_ops.push(json!({
                    "op": "add",
                    "path": format!("/{}", aws_name),
                    "value": value.to_json(),
                }));
            }
        }

        if patch_ops.is_empty() {
            debug!("No in-place changes for {}", id);
            return self.read_resource(&id, Some(identifier)).await;
        }

        let requested = if kind == ResourceKind::OdbNetwork {
            let touched = ManagedService::ALL
                .into_iter()
                .filter(|s| changed.iter().any(|c| c == s.attribute()));
            requested_services(&to.attributes, touched).map_err(|e| e.for_resource(id.clone()))?
        } else {
            Vec::new()
        };

        info!("Updating {} ({})", id, changed.join(", "));
        let deadline = Deadline::after(Phase::Updated.timeout(&self.config));
        self.api
            .update_resource(kind, identifier, patch_ops, deadline)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let record = self
            .wait_settled(&id, kind, identifier, Phase::Updated, deadline)
            .await?;
        let record = self
            .wait_services(&id, identifier, &requested, deadline)
            .await?
            .unwrap_or(record);

        Ok(self.state_from_record(&id, &record))
    }

    /// Delete a resource and wait until it is gone
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let kind = Self::managed_kind_for(id)?;

        info!("Deleting {}", id);
        let deadline = Deadline::after(Phase::Deleted.timeout(&self.config));
        match self.api.delete_resource(kind, identifier, deadline).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("{} {} is already gone", kind, identifier);
                return Ok(());
            }
            Err(e) => return Err(e.for_resource(id.clone())),
        }

        let convergence = wait_for_phase(
            self.api.as_ref(),
            kind,
            identifier,
            Phase::Deleted,
            &self.config,
            deadline,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        match convergence {
            Convergence::Gone => Ok(()),
            _ => Err(
                ProviderError::new(format!("{} {} still exists", kind, identifier))
                    .for_resource(id.clone()),
            ),
        }
    }

    /// Wait for an existing resource to settle after an operation started
    /// elsewhere. A completed delete yields `State::not_found`.
    pub async fn wait_for(
        &self,
        id: &ResourceId,
        identifier: &str,
        phase: Phase,
    ) -> ProviderResult<State> {
        let kind = Self::managed_kind_for(id)?;
        let deadline = Deadline::after(phase.timeout(&self.config));
        if phase == Phase::Deleted {
            let convergence =
                wait_for_phase(self.api.as_ref(), kind, identifier, phase, &self.config, deadline)
                    .await
                    .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;
            return match convergence {
                Convergence::Gone => Ok(State::not_found(id.clone())),
                _ => Err(
                    ProviderError::new(format!("{} {} still exists", kind, identifier))
                        .for_resource(id.clone()),
                ),
            };
        }
        let record = self
            .wait_settled(id, kind, identifier, phase, deadline)
            .await?;
        Ok(self.state_from_record(id, &record))
    }

    // =========================================================================
    // Wait Helpers
    // =========================================================================

    /// Wait for `phase` and turn a remote failure into an error
    async fn wait_settled(
        &self,
        id: &ResourceId,
        kind: ResourceKind,
        identifier: &str,
        phase: Phase,
        deadline: Deadline,
    ) -> ProviderResult<Record> {
        let convergence =
            wait_for_phase(self.api.as_ref(), kind, identifier, phase, &self.config, deadline)
                .await
                .map_err(|e| ProviderError::from(e).for_resource(id.clone()))?;

        match convergence {
            Convergence::Reached(record) => Ok(record),
            Convergence::Failed(record) => {
                let reason = record
                    .status_reason()
                    .unwrap_or_else(|| "no reason given".to_string());
                Err(ProviderError::new(format!(
                    "{} {} failed to be {}: {}",
                    kind, identifier, phase, reason
                ))
                .for_resource(id.clone()))
            }
            Convergence::Gone => Err(ProviderError::not_found(format!(
                "{} {} disappeared while waiting",
                kind, identifier
            ))
            .for_resource(id.clone())),
        }
    }

    async fn wait_services(
        &self,
        id: &ResourceId,
        network_id: &str,
        requested: &[(ManagedService, bool)],
        deadline: Deadline,
    ) -> ProviderResult<Option<Record>> {
        wait_managed_services(
            self.api.as_ref(),
            network_id,
            requested,
            &self.config,
            deadline,
        )
        .await
        .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }

    // =========================================================================
    // Value Conversion Helpers
    // =========================================================================

    /// Build the property document for a create from a normalized resource
    fn desired_properties(
        &self,
        config: &ResourceConfig,
        resource: &Resource,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut desired_state = serde_json::Map::new();

        for (name, value) in &resource.attributes {
            if name.starts_with('_') {
                continue;
            }
            match config.attribute(name) {
                Some(&(_, aws_name, _)) => {
                    desired_state.insert(aws_name.to_string(), value.to_json());
                }
                None => warn!("Ignoring unknown attribute {} on {}", name, resource.id),
            }
        }

        desired_state
    }

    /// Reconcile a settled record into local state
    fn state_from_record(&self, id: &ResourceId, record: &Record) -> State {
        let config = record.kind.config();
        let mut attributes = HashMap::new();

        for (dsl_name, aws_name, _) in config.attributes {
            if let Some(value) = record.property(aws_name).and_then(Value::from_json) {
                attributes.insert(dsl_name.to_string(), value);
            }
        }

        if let Some((dsl_name, aws_name)) = config.parent_identifier
            && let Some(value) = record.property(aws_name).and_then(Value::from_json)
        {
            attributes.insert(dsl_name.to_string(), value);
        }

        let own_id = record
            .property(config.identifier)
            .and_then(Value::from_json)
            .unwrap_or_else(|| Value::String(record.identifier.clone()));
        attributes.insert("id".to_string(), own_id);

        for (dsl_name, aws_name) in [("status", "Status"), ("status_reason", "StatusReason")] {
            if let Some(value) = record.property(aws_name).and_then(Value::from_json) {
                attributes.insert(dsl_name.to_string(), value);
            }
        }

        self.read_special_attributes(record, &mut attributes);

        State::existing(id.clone(), attributes).with_identifier(record.identifier.clone())
    }

    /// Handle attributes that don't follow the standard mapping
    fn read_special_attributes(&self, record: &Record, attributes: &mut HashMap<String, Value>) {
        if record.kind != ResourceKind::OdbNetwork {
            return;
        }
        // The read path reports managed services only as nested status
        for service in ManagedService::ALL {
            if attributes.contains_key(service.attribute()) {
                continue;
            }
            let setting = match record.managed_service_status(service) {
                Ok(ManagedResourceStatus::Enabled | ManagedResourceStatus::Enabling) => "ENABLED",
                Ok(ManagedResourceStatus::Disabled | ManagedResourceStatus::Disabling) => {
                    "DISABLED"
                }
                Err(_) => continue,
            };
            attributes.insert(
                service.attribute().to_string(),
                Value::String(setting.to_string()),
            );
        }
    }
}

/// DSL value in the form the control plane accepts and reports back
fn normalize_value(dsl_name: &str, value: &Value) -> Value {
    match (dsl_name, value) {
        ("availability_zone", Value::String(s)) => Value::String(normalize_availability_zone(s)),
        (name, Value::Bool(enabled)) if ManagedService::ALL.iter().any(|s| s.attribute() == name) => {
            Value::String(ManagedResourceStatus::settled(*enabled).to_string())
        }
        _ => value.clone(),
    }
}

/// Desired enablement of each of `services` set in `attributes`
fn requested_services(
    attributes: &HashMap<String, Value>,
    services: impl IntoIterator<Item = ManagedService>,
) -> ProviderResult<Vec<(ManagedService, bool)>> {
    let mut requested = Vec::new();
    for service in services {
        let enabled = match attributes.get(service.attribute()) {
            None => continue,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s == "ENABLED" => true,
            Some(Value::String(s)) if s == "DISABLED" => false,
            Some(other) => {
                return Err(ProviderError::new(format!(
                    "{} must be ENABLED or DISABLED, got {:?}",
                    service.attribute(),
                    other
                )));
            }
        };
        requested.push((service, enabled));
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, Reply};
    use odb_core::differ::{Diff, diff};
    use std::sync::Arc;
    use std::time::Duration;

    /// Lets tests inspect the fake after handing it to the provider
    struct Shared(Arc<FakeApi>);

    #[async_trait::async_trait]
    impl OdbApi for Shared {
        async fn get_resource(
            &self,
            kind: ResourceKind,
            identifier: &str,
        ) -> ProviderResult<serde_json::Value> {
            self.0.get_resource(kind, identifier).await
        }

        async fn create_resource(
            &self,
            kind: ResourceKind,
            desired_state: serde_json::Value,
            deadline: Deadline,
        ) -> ProviderResult<String> {
            self.0.create_resource(kind, desired_state, deadline).await
        }

        async fn update_resource(
            &self,
            kind: ResourceKind,
            identifier: &str,
            patch_ops: Vec<serde_json::Value>,
            deadline: Deadline,
        ) -> ProviderResult<()> {
            self.0.update_resource(kind, identifier, patch_ops, deadline).await
        }

        async fn delete_resource(
            &self,
            kind: ResourceKind,
            identifier: &str,
            deadline: Deadline,
        ) -> ProviderResult<()> {
            self.0.delete_resource(kind, identifier, deadline).await
        }
    }

    fn provider() -> (OdbProvider, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        let config = WaitConfig {
            poll_interval: Duration::from_secs(10),
            not_found_tolerance: 2,
            ..Default::default()
        };
        (
            OdbProvider::with_api(Box::new(Shared(api.clone())), config),
            api,
        )
    }

    fn found(props: serde_json::Value) -> Reply {
        Reply::Found(props)
    }

    fn network_props(status: &str, s3: &str, zero_etl: &str) -> serde_json::Value {
        json!({
            "OdbNetworkId": "odbnet-1",
            "DisplayName": "primary",
            "Status": status,
            "ManagedServices": {
                "S3Access": {"Status": s3},
                "ZeroEtlAccess": {"Status": zero_etl},
            },
        })
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_until_available_and_reconciles() {
        let (provider, api) = provider();
        api.create_returns("exa-1");
        api.script(
            "exa-1",
            [
                Reply::NotFound,
                found(json!({"Status": "PROVISIONING"})),
                found(json!({
                    "CloudExadataInfrastructureId": "exa-1",
                    "DisplayName": "exa",
                    "Shape": "Exadata.X11M",
                    "AvailabilityZone": "us-east-1a",
                    "Status": "AVAILABLE",
                    "MaintenanceWindow": {"Preference": "NO_PREFERENCE"},
                })),
            ],
        );

        let resource = Resource::new("odb.cloud_exadata_infrastructure", "exa")
            .with_attribute("display_name", Value::String("exa".to_string()))
            .with_attribute("shape", Value::String("Exadata.X11M".to_string()))
            .with_attribute(
                "availability_zone",
                Value::String("aws.AvailabilityZone.us_east_1a".to_string()),
            );

        let state = provider.create_resource(resource.clone()).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("exa-1"));
        // The next plan finds nothing to do
        assert_eq!(
            diff(&provider.normalize_resource(&resource), &state),
            Diff::NoChange(resource.id.clone())
        );
        assert_eq!(
            state.attributes.get("status"),
            Some(&Value::String("AVAILABLE".to_string()))
        );
        assert_eq!(
            state.attributes.get("availability_zone"),
            Some(&Value::String("us-east-1a".to_string()))
        );
        assert!(matches!(
            state.attributes.get("maintenance_window"),
            Some(Value::Map(_))
        ));
        assert_eq!(api.gets("exa-1"), 3);

        let created = api.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1["AvailabilityZone"], json!("us-east-1a"));
        assert_eq!(created[0].1["Shape"], json!("Exadata.X11M"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_surfaces_failed_status_as_error() {
        let (provider, api) = provider();
        api.create_returns("vmc-1");
        api.script(
            "vmc-1",
            [
                found(json!({"Status": "PROVISIONING"})),
                found(json!({"Status": "FAILED", "StatusReason": "insufficient capacity"})),
            ],
        );

        let err = provider
            .create_resource(Resource::new("odb.cloud_vm_cluster", "cluster"))
            .await
            .unwrap_err();

        assert!(!err.is_not_found());
        assert!(err.message.contains("insufficient capacity"));
        assert_eq!(
            err.resource_id,
            Some(ResourceId::new("odb.cloud_vm_cluster", "cluster"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_reports_resource_that_never_appears() {
        let (provider, api) = provider();
        api.create_returns("avmc-1");

        let err = provider
            .create_resource(Resource::new("odb.cloud_autonomous_vm_cluster", "auto"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        // Tolerance of 2, so the third absent poll ends the wait
        assert_eq!(api.gets("avmc-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn create_network_waits_for_each_managed_service() {
        let (provider, api) = provider();
        api.create_returns("odbnet-1");
        api.script(
            "odbnet-1",
            [
                found(network_props("PROVISIONING", "DISABLED", "DISABLED")),
                found(network_props("AVAILABLE", "ENABLING", "ENABLING")),
                // S3 access
                found(network_props("AVAILABLE", "ENABLING", "ENABLING")),
                found(network_props("AVAILABLE", "ENABLED", "ENABLING")),
                // Zero-ETL access
                found(network_props("AVAILABLE", "ENABLED", "ENABLING")),
                found(network_props("AVAILABLE", "ENABLED", "ENABLED")),
            ],
        );

        let resource = Resource::new("odb.network", "primary")
            .with_attribute("display_name", Value::String("primary".to_string()))
            .with_attribute("s3_access", Value::Bool(true))
            .with_attribute("zero_etl_access", Value::String("ENABLED".to_string()));

        let state = provider.create_resource(resource.clone()).await.unwrap();

        assert_eq!(api.gets("odbnet-1"), 6);
        assert_eq!(
            diff(&provider.normalize_resource(&resource), &state),
            Diff::NoChange(resource.id.clone())
        );
        assert_eq!(
            state.attributes.get("s3_access"),
            Some(&Value::String("ENABLED".to_string()))
        );
        assert_eq!(
            state.attributes.get("zero_etl_access"),
            Some(&Value::String("ENABLED".to_string()))
        );
        assert_eq!(api.created()[0].1["S3Access"], json!("ENABLED"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_network_rejects_invalid_service_setting() {
        let (provider, api) = provider();
        api.create_returns("odbnet-1");

        let resource = Resource::new("odb.network", "primary")
            .with_attribute("s3_access", Value::String("MAYBE".to_string()));

        let err = provider.create_resource(resource).await.unwrap_err();

        assert!(err.message.contains("s3_access"));
        assert!(api.created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_network_patches_and_waits_for_touched_service() {
        let (provider, api) = provider();
        api.script(
            "odbnet-1",
            [
                found(network_props("UPDATING", "ENABLED", "DISABLED")),
                found(network_props("AVAILABLE", "DISABLING", "DISABLED")),
                found(network_props("AVAILABLE", "DISABLING", "DISABLED")),
                found(network_props("AVAILABLE", "DISABLED", "DISABLED")),
            ],
        );

        let from = State::existing(
            ResourceId::new("odb.network", "primary"),
            [
                ("s3_access".to_string(), Value::String("ENABLED".to_string())),
                ("zero_etl_access".to_string(), Value::String("DISABLED".to_string())),
            ]
            .into_iter()
            .collect(),
        );
        let to = Resource::new("odb.network", "primary")
            .with_attribute("s3_access", Value::String("DISABLED".to_string()))
            .with_attribute("zero_etl_access", Value::String("DISABLED".to_string()));

        let state = provider
            .update_resource(to.id.clone(), "odbnet-1", &from, to)
            .await
            .unwrap();

        let updated = api.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(
            updated[0].1,
            vec![json!({"op": "add", "path": "/S3Access", "value": "DISABLED"})]
        );
        assert_eq!(api.gets("odbnet-1"), 4);
        assert_eq!(
            state.attributes.get("s3_access"),
            Some(&Value::String("DISABLED".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_rejects_attributes_that_need_replacement() {
        let (provider, api) = provider();
        let from = State::existing(
            ResourceId::new("odb.cloud_vm_cluster", "cluster"),
            [("cpu_core_count".to_string(), Value::Int(16))]
                .into_iter()
                .collect(),
        );
        let to = Resource::new("odb.cloud_vm_cluster", "cluster")
            .with_attribute("cpu_core_count", Value::Int(32));

        let err = provider
            .update_resource(to.id.clone(), "vmc-1", &from, to)
            .await
            .unwrap_err();

        assert!(err.message.contains("cpu_core_count"));
        assert!(api.updated().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_until_gone() {
        let (provider, api) = provider();
        api.script(
            "pcx-1",
            [
                found(json!({"Status": "TERMINATING"})),
                Reply::NotFound,
            ],
        );

        provider
            .delete_resource(
                &ResourceId::new("odb.network_peering_connection", "peer"),
                "pcx-1",
            )
            .await
            .unwrap();

        assert_eq!(api.deleted(), vec!["pcx-1"]);
        assert_eq!(api.gets("pcx-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_resource_succeeds_without_waiting() {
        let (provider, api) = provider();
        api.delete_reports_not_found();

        provider
            .delete_resource(&ResourceId::new("odb.network", "primary"), "odbnet-1")
            .await
            .unwrap();

        assert_eq!(api.gets("odbnet-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_surfaces_refresh_errors() {
        let (provider, api) = provider();
        api.script("odbnet-1", [Reply::Error("access denied")]);

        let err = provider
            .delete_resource(&ResourceId::new("odb.network", "primary"), "odbnet-1")
            .await
            .unwrap_err();

        assert!(err.message.contains("access denied"));
        assert_eq!(api.gets("odbnet-1"), 1);
    }

    #[tokio::test]
    async fn read_missing_resource_returns_not_found_state() {
        let (provider, _api) = provider();
        let id = ResourceId::new("odb.network", "primary");

        let state = provider.read_resource(&id, Some("odbnet-9")).await.unwrap();
        assert!(!state.exists);

        let state = provider.read_resource(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn read_data_source_uses_parent_identifier() {
        let (provider, api) = provider();
        api.script(
            "vmc-1|dbnode-1",
            [found(json!({
                "DbNodeId": "dbnode-1",
                "CloudVmClusterId": "vmc-1",
                "Hostname": "node1",
                "Status": "AVAILABLE",
            }))],
        );

        let resource = Resource::new("odb.db_node", "node")
            .with_read_only(true)
            .with_attribute("cloud_vm_cluster_id", Value::String("vmc-1".to_string()))
            .with_attribute("id", Value::String("dbnode-1".to_string()));

        let state = provider.read_data_source(&resource).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("vmc-1|dbnode-1"));
        assert_eq!(
            state.attributes.get("id"),
            Some(&Value::String("dbnode-1".to_string()))
        );
        assert_eq!(
            state.attributes.get("hostname"),
            Some(&Value::String("node1".to_string()))
        );
    }

    #[tokio::test]
    async fn read_data_source_requires_parent() {
        let (provider, _api) = provider();
        let resource = Resource::new("odb.db_server", "server")
            .with_attribute("id", Value::String("dbs-1".to_string()));

        let err = provider.read_data_source(&resource).await.unwrap_err();
        assert!(err.message.contains("cloud_exadata_infrastructure_id"));
    }

    #[tokio::test]
    async fn data_sources_cannot_be_created() {
        let (provider, api) = provider();

        let err = provider
            .create_resource(Resource::new("odb.db_server", "server"))
            .await
            .unwrap_err();

        assert!(err.message.contains("data source"));
        assert!(api.created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_deleted_returns_not_found_state() {
        let (provider, api) = provider();
        api.script("exa-1", [Reply::NotFound]);

        let state = provider
            .wait_for(
                &ResourceId::new("odb.cloud_exadata_infrastructure", "exa"),
                "exa-1",
                Phase::Deleted,
            )
            .await
            .unwrap();

        assert!(!state.exists);
    }

    #[tokio::test(start_paused = true)]
    async fn create_network_waits_share_the_create_timeout() {
        let api = Arc::new(FakeApi::new());
        let mut config = WaitConfig {
            poll_interval: Duration::from_secs(10),
            not_found_tolerance: 2,
            ..Default::default()
        };
        config.timeouts.create = Duration::from_secs(100);
        let provider = OdbProvider::with_api(Box::new(Shared(api.clone())), config);

        api.create_returns("odbnet-1");
        let mut replies = vec![found(network_props("PROVISIONING", "DISABLED", "DISABLED")); 5];
        // Network available at 50s
        replies.push(found(network_props("AVAILABLE", "ENABLING", "ENABLING")));
        // S3 access enabled at 100s
        replies.extend(vec![found(network_props("AVAILABLE", "ENABLING", "ENABLING")); 5]);
        replies.extend(vec![found(network_props("AVAILABLE", "ENABLED", "ENABLING")); 3]);
        replies.push(found(network_props("AVAILABLE", "ENABLED", "ENABLED")));
        api.script("odbnet-1", replies);

        let resource = Resource::new("odb.network", "primary")
            .with_attribute("s3_access", Value::Bool(true))
            .with_attribute("zero_etl_access", Value::Bool(true));
        let started = tokio::time::Instant::now();

        let err = provider.create_resource(resource).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() <= Duration::from_secs(100));
        // Nothing is left for Zero-ETL access after one poll
        assert_eq!(api.gets("odbnet-1"), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn update_with_declared_forms_of_reported_values_is_a_no_op() {
        let (provider, api) = provider();
        api.script(
            "exa-1",
            [found(json!({
                "CloudExadataInfrastructureId": "exa-1",
                "AvailabilityZone": "us-east-1a",
                "Status": "AVAILABLE",
            }))],
        );

        let from = State::existing(
            ResourceId::new("odb.cloud_exadata_infrastructure", "exa"),
            [(
                "availability_zone".to_string(),
                Value::String("us-east-1a".to_string()),
            )]
            .into_iter()
            .collect(),
        );
        let to = Resource::new("odb.cloud_exadata_infrastructure", "exa").with_attribute(
            "availability_zone",
            Value::String("aws.AvailabilityZone.us_east_1a".to_string()),
        );

        let state = provider
            .update_resource(to.id.clone(), "exa-1", &from, to)
            .await
            .unwrap();

        assert!(state.exists);
        assert!(api.updated().is_empty());
    }

    #[test]
    fn test_requires_replacement() {
        let (provider, _api) = provider();
        let cluster = ResourceId::new("odb.cloud_vm_cluster", "cluster");
        let network = ResourceId::new("odb.network", "primary");

        assert!(provider.requires_replacement(&cluster, "cpu_core_count"));
        assert!(!provider.requires_replacement(&network, "s3_access"));
        assert!(!provider.requires_replacement(&network, "no_such_attribute"));
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(
            normalize_value("s3_access", &Value::Bool(false)),
            Value::String("DISABLED".to_string())
        );
        assert_eq!(
            normalize_value("availability_zone", &Value::String("us_west_2b".to_string())),
            Value::String("us-west-2b".to_string())
        );
        assert_eq!(
            normalize_value("is_local_backup_enabled", &Value::Bool(true)),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_requested_services_accepts_bools_and_strings() {
        let attributes: HashMap<String, Value> = [
            ("s3_access".to_string(), Value::Bool(true)),
            ("zero_etl_access".to_string(), Value::String("DISABLED".to_string())),
        ]
        .into_iter()
        .collect();

        let requested = requested_services(&attributes, ManagedService::ALL).unwrap();

        assert_eq!(
            requested,
            vec![
                (ManagedService::S3Access, true),
                (ManagedService::ZeroEtlAccess, false)
            ]
        );
    }
}
