//! Remote control plane access
//!
//! [`OdbApi`] is the seam between the resource handlers and the remote
//! API. Resources travel as JSON property documents keyed by the
//! CloudFormation property names in [`crate::resources`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::error::DisplayErrorContext;
use aws_sdk_cloudcontrol::types::{HandlerErrorCode, ProgressEvent};
use log::debug;
use odb_core::provider::{ProviderError, ProviderResult};
use odb_core::wait::{Convergence, Deadline, WaitSpec, project_status, wait_for_state};

use crate::resources::ResourceKind;
use crate::status::RequestStatus;

/// Operations the handlers need from the control plane
#[async_trait]
pub trait OdbApi: Send + Sync {
    /// Fetch the properties of a resource.
    ///
    /// A missing resource is reported as a not-found [`ProviderError`].
    async fn get_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> ProviderResult<serde_json::Value>;

    /// Create a resource and return its identifier.
    ///
    /// Mutating calls may wait for the control plane to accept the request,
    /// but never past `deadline`.
    async fn create_resource(
        &self,
        kind: ResourceKind,
        desired_state: serde_json::Value,
        deadline: Deadline,
    ) -> ProviderResult<String>;

    /// Apply JSON Patch operations to a resource
    async fn update_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
        deadline: Deadline,
    ) -> ProviderResult<()>;

    /// Delete a resource
    async fn delete_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        deadline: Deadline,
    ) -> ProviderResult<()>;
}

/// Poll interval for Cloud Control request status
const REQUEST_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// [`OdbApi`] backed by the AWS Cloud Control API
pub struct CloudControlApi {
    client: CloudControlClient,
}

impl CloudControlApi {
    /// Create a new CloudControlApi for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::with_client(CloudControlClient::new(&config))
    }

    /// Create with a specific client (for testing)
    pub fn with_client(client: CloudControlClient) -> Self {
        Self { client }
    }

    async fn request_status(&self, request_token: &str) -> ProviderResult<ProgressEvent> {
        let status = self
            .client
            .get_resource_request_status()
            .request_token(request_token)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to get operation status: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        status.progress_event().cloned().ok_or_else(|| {
            ProviderError::not_found(format!("No progress reported for request {}", request_token))
        })
    }

    /// Wait for a Cloud Control request to complete and return the
    /// identifier it reports
    async fn wait_for_request(
        &self,
        request_token: &str,
        deadline: Deadline,
    ) -> ProviderResult<Option<String>> {
        let spec = WaitSpec::new(
            [
                RequestStatus::Pending,
                RequestStatus::InProgress,
                RequestStatus::CancelInProgress,
            ],
            [
                RequestStatus::Success,
                RequestStatus::Failed,
                RequestStatus::CancelComplete,
            ],
            deadline.remaining(),
        )
        .poll_interval(REQUEST_POLL_INTERVAL);

        let convergence = wait_for_state(&spec, || {
            project_status(self.request_status(request_token), operation_status)
        })
        .await?;

        match convergence {
            Convergence::Reached(progress) => Ok(progress.identifier().map(str::to_string)),
            Convergence::Failed(progress) => Err(request_failure(&progress)),
            Convergence::Gone => Err(ProviderError::not_found(format!(
                "Request {} disappeared",
                request_token
            ))),
        }
    }
}

fn operation_status(progress: &ProgressEvent) -> ProviderResult<RequestStatus> {
    let status = progress
        .operation_status()
        .ok_or_else(|| ProviderError::new("Progress event without operation status"))?;
    RequestStatus::from_str(status.as_str()).map_err(|e| ProviderError::new(e.to_string()))
}

fn request_failure(progress: &ProgressEvent) -> ProviderError {
    let msg = progress.status_message().unwrap_or("Unknown error");
    if progress.error_code() == Some(&HandlerErrorCode::NotFound) {
        return ProviderError::not_found(msg.to_string());
    }
    match operation_status(progress) {
        Ok(RequestStatus::CancelComplete) => ProviderError::new("Operation was cancelled"),
        _ => ProviderError::new(format!("Operation failed: {}", msg)),
    }
}

#[async_trait]
impl OdbApi for CloudControlApi {
    async fn get_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> ProviderResult<serde_json::Value> {
        let result = self
            .client
            .get_resource()
            .type_name(kind.config().aws_type_name)
            .identifier(identifier)
            .send()
            .await;

        match result {
            Ok(response) => {
                let props_str = response
                    .resource_description()
                    .and_then(|desc| desc.properties())
                    .ok_or_else(|| {
                        ProviderError::not_found(format!("{} {} not found", kind, identifier))
                    })?;
                serde_json::from_str(props_str).map_err(|e| {
                    ProviderError::new(format!("Invalid properties for {}: {}", identifier, e))
                })
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                Err(ProviderError::not_found(format!(
                    "{} {} not found",
                    kind, identifier
                )))
            }
            Err(e) => Err(ProviderError::new(format!(
                "Failed to get resource: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        desired_state: serde_json::Value,
        deadline: Deadline,
    ) -> ProviderResult<String> {
        let result = self
            .client
            .create_resource()
            .type_name(kind.config().aws_type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to create resource: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let request_token = result
            .progress_event()
            .and_then(|p| p.request_token())
            .ok_or_else(|| ProviderError::new("No request token returned"))?;
        debug!("Create request for {} accepted: {}", kind, request_token);

        self.wait_for_request(request_token, deadline)
            .await?
            .ok_or_else(|| ProviderError::new("No identifier returned"))
    }

    async fn update_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
        deadline: Deadline,
    ) -> ProviderResult<()> {
        if patch_ops.is_empty() {
            return Ok(());
        }

        let patch_document = serde_json::to_string(&patch_ops)
            .map_err(|e| ProviderError::new(format!("Failed to build patch: {}", e)))?;

        let result = self
            .client
            .update_resource()
            .type_name(kind.config().aws_type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to update resource: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_request(request_token, deadline).await?;
        }

        Ok(())
    }

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        deadline: Deadline,
    ) -> ProviderResult<()> {
        let result = self
            .client
            .delete_resource()
            .type_name(kind.config().aws_type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Failed to delete resource: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_request(request_token, deadline).await?;
        }

        Ok(())
    }
}
