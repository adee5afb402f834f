//! Scripted in-memory control plane for tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use odb_core::provider::{ProviderError, ProviderResult};
use odb_core::wait::Deadline;

use crate::api::OdbApi;
use crate::resources::ResourceKind;

/// One answer to a `get_resource` call
#[derive(Debug, Clone)]
pub enum Reply {
    Found(serde_json::Value),
    NotFound,
    Error(&'static str),
}

#[derive(Default)]
struct Inner {
    scripts: HashMap<String, VecDeque<Reply>>,
    gets: HashMap<String, u32>,
    next_identifier: Option<String>,
    created: Vec<(ResourceKind, serde_json::Value)>,
    updated: Vec<(String, Vec<serde_json::Value>)>,
    deleted: Vec<String>,
    delete_not_found: bool,
}

/// Replays scripted replies per identifier; the last reply repeats
#[derive(Default)]
pub struct FakeApi {
    inner: Mutex<Inner>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, identifier: &str, replies: impl IntoIterator<Item = Reply>) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert(identifier.to_string(), replies.into_iter().collect());
    }

    /// Identifier handed out by the next create
    pub fn create_returns(&self, identifier: &str) {
        self.inner.lock().unwrap().next_identifier = Some(identifier.to_string());
    }

    /// Make deletes report the resource as already gone
    pub fn delete_reports_not_found(&self) {
        self.inner.lock().unwrap().delete_not_found = true;
    }

    pub fn gets(&self, identifier: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .gets
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    pub fn created(&self) -> Vec<(ResourceKind, serde_json::Value)> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn updated(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        self.inner.lock().unwrap().updated.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl OdbApi for FakeApi {
    async fn get_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> ProviderResult<serde_json::Value> {
        let reply = {
            let mut inner = self.inner.lock().unwrap();
            *inner.gets.entry(identifier.to_string()).or_insert(0) += 1;
            match inner.scripts.get_mut(identifier) {
                Some(replies) if replies.len() > 1 => replies.pop_front(),
                Some(replies) => replies.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Found(props)) => Ok(props),
            Some(Reply::Error(msg)) => Err(ProviderError::new(msg)),
            Some(Reply::NotFound) | None => Err(ProviderError::not_found(format!(
                "{} {} not found",
                kind, identifier
            ))),
        }
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        desired_state: serde_json::Value,
        _deadline: Deadline,
    ) -> ProviderResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.created.push((kind, desired_state));
        inner
            .next_identifier
            .take()
            .ok_or_else(|| ProviderError::new("create rejected"))
    }

    async fn update_resource(
        &self,
        _kind: ResourceKind,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
        _deadline: Deadline,
    ) -> ProviderResult<()> {
        self.inner
            .lock()
            .unwrap()
            .updated
            .push((identifier.to_string(), patch_ops));
        Ok(())
    }

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        _deadline: Deadline,
    ) -> ProviderResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.deleted.push(identifier.to_string());
        if inner.delete_not_found {
            return Err(ProviderError::not_found(format!(
                "{} {} not found",
                kind, identifier
            )));
        }
        Ok(())
    }
}
