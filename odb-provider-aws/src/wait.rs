//! Lifecycle waits for ODB resources
//!
//! Every managed kind shares the same three waits (created, updated,
//! deleted); they differ only in which record is fetched. ODB networks
//! additionally wait on each managed service reaching its requested state.
//!
//! All waits of one operation share a [`Deadline`]; each gets only the
//! time the earlier ones left over.

use std::time::Duration;

use log::info;
use odb_core::config::WaitConfig;
use odb_core::wait::{Convergence, Deadline, WaitResult, WaitSpec, project_status, wait_for_state};

use crate::api::OdbApi;
use crate::record::{ManagedService, Record, find_record};
use crate::resources::ResourceKind;
use crate::status::{ManagedResourceStatus, ResourceStatus};

/// Lifecycle phase following a mutating call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Created => f.write_str("created"),
            Phase::Updated => f.write_str("updated"),
            Phase::Deleted => f.write_str("deleted"),
        }
    }
}

impl Phase {
    pub fn timeout(&self, config: &WaitConfig) -> Duration {
        match self {
            Phase::Created => config.timeouts.create,
            Phase::Updated => config.timeouts.update,
            Phase::Deleted => config.timeouts.delete,
        }
    }

    /// The wait for this phase
    pub fn spec(&self, config: &WaitConfig) -> WaitSpec<ResourceStatus> {
        let timeout = self.timeout(config);
        let settled = [ResourceStatus::Available, ResourceStatus::Failed];
        match self {
            Phase::Created => WaitSpec::new([ResourceStatus::Provisioning], settled, timeout)
                .not_found_tolerance(config.not_found_tolerance)
                .continuous_target_occurrence(config.continuous_target_occurrence),
            Phase::Updated => WaitSpec::new([ResourceStatus::Updating], settled, timeout)
                .not_found_tolerance(config.not_found_tolerance)
                .continuous_target_occurrence(config.continuous_target_occurrence),
            Phase::Deleted => WaitSpec::new([ResourceStatus::Terminating], [], timeout)
                .not_found_tolerance(config.delete_not_found_tolerance),
        }
        .poll_interval(config.poll_interval)
    }
}

/// Wait for a managed service to settle as enabled or disabled
pub fn managed_service_spec(
    config: &WaitConfig,
    enabled: bool,
    timeout: Duration,
) -> WaitSpec<ManagedResourceStatus> {
    WaitSpec::new(
        [ManagedResourceStatus::transitioning(enabled)],
        [ManagedResourceStatus::settled(enabled)],
        timeout,
    )
    .poll_interval(config.poll_interval)
    .not_found_tolerance(config.not_found_tolerance)
    .continuous_target_occurrence(config.continuous_target_occurrence)
}

/// Wait for a resource to settle after the mutation for `phase`
pub async fn wait_for_phase(
    api: &dyn OdbApi,
    kind: ResourceKind,
    identifier: &str,
    phase: Phase,
    config: &WaitConfig,
    deadline: Deadline,
) -> WaitResult<Convergence<Record>> {
    info!("Waiting for {} {} to be {}", kind, identifier, phase);
    let spec = phase.spec(config).timeout(deadline.remaining());
    wait_for_state(&spec, || {
        project_status(find_record(api, kind, identifier), Record::status)
    })
    .await
}

/// Wait for one managed service of an ODB network to reach the requested
/// state. The parent network is fetched on every poll; only the service's
/// own status is considered.
pub async fn wait_managed_service(
    api: &dyn OdbApi,
    network_id: &str,
    service: ManagedService,
    enabled: bool,
    config: &WaitConfig,
    deadline: Deadline,
) -> WaitResult<Convergence<Record>> {
    info!(
        "Waiting for {} on {} to be {}",
        service,
        network_id,
        ManagedResourceStatus::settled(enabled)
    );
    let spec = managed_service_spec(config, enabled, deadline.remaining());
    wait_for_state(&spec, || {
        project_status(
            find_record(api, ResourceKind::OdbNetwork, network_id),
            |record: &Record| record.managed_service_status(service),
        )
    })
    .await
}

/// Wait for each requested managed service in turn. Returns the network
/// record observed last, or `None` if nothing was requested.
pub async fn wait_managed_services(
    api: &dyn OdbApi,
    network_id: &str,
    requested: &[(ManagedService, bool)],
    config: &WaitConfig,
    deadline: Deadline,
) -> WaitResult<Option<Record>> {
    let mut latest = None;
    for &(service, enabled) in requested {
        let convergence =
            wait_managed_service(api, network_id, service, enabled, config, deadline).await?;
        latest = convergence.into_record();
    }
    Ok(latest)
}
