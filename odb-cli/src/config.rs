//! Configuration file loading
//!
//! A configuration is a JSON document with a `provider` block and a list of
//! resource declarations. String attribute values of the form
//! `${<type>.<name>.<attribute>}` refer to attributes of other resources
//! and are resolved against their state before each operation.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::warn;
use odb_core::config::WaitConfig;
use odb_core::resource::{Resource, ResourceId, Value};
use odb_provider_aws::ResourceKind;
use serde::Deserialize;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "odb.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub region: String,
    #[serde(default)]
    pub wait: WaitConfig,
}

/// One declared resource or data source
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .provider
            .wait
            .validate()
            .context("Invalid wait configuration")?;
        Ok(config)
    }

    /// Declared resources in declaration order
    pub fn resources(&self) -> Result<Vec<Resource>> {
        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(self.resources.len());

        for decl in &self.resources {
            let kind = ResourceKind::from_resource_type(&decl.resource_type)
                .with_context(|| format!("Unknown resource type: {}", decl.resource_type))?;

            let id = ResourceId::new(&decl.resource_type, &decl.name);
            if !seen.insert(id.clone()) {
                bail!("Duplicate resource: {}", id);
            }

            let mut resource =
                Resource::new(&decl.resource_type, &decl.name).with_read_only(kind.is_data_source());
            for (key, value) in &decl.attributes {
                if let Some(value) = Value::from_json(value) {
                    resource.attributes.insert(key.clone(), value);
                }
            }
            resources.push(resource);
        }

        Ok(resources)
    }
}

/// Parse a `${type.name.attribute}` reference into the referenced resource
/// (`type.name`) and attribute
fn parse_ref(s: &str) -> Option<(&str, &str)> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (binding, attribute) = inner.rsplit_once('.')?;
    if binding.is_empty() || attribute.is_empty() {
        return None;
    }
    Some((binding, attribute))
}

/// Resolve references in `value` against known attributes keyed by
/// `type.name`. Unknown references are kept as-is, and so is a reference
/// that leads back to itself.
pub fn resolve_ref_value(value: &Value, bindings: &HashMap<String, HashMap<String, Value>>) -> Value {
    resolve_with(value, bindings, &mut Vec::new())
}

fn resolve_with(
    value: &Value,
    bindings: &HashMap<String, HashMap<String, Value>>,
    following: &mut Vec<String>,
) -> Value {
    match value {
        Value::String(s) => {
            let Some((binding, attribute)) = parse_ref(s) else {
                return value.clone();
            };
            if following.iter().any(|r| r == s) {
                warn!("Reference cycle through {}", s);
                return value.clone();
            }
            match bindings.get(binding).and_then(|attrs| attrs.get(attribute)) {
                Some(target) => {
                    following.push(s.clone());
                    let resolved = resolve_with(target, bindings, following);
                    following.pop();
                    resolved
                }
                None => value.clone(),
            }
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|v| resolve_with(v, bindings, following))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_with(v, bindings, following)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Resolve every attribute of `resource`
pub fn resolve_resource(
    resource: &Resource,
    bindings: &HashMap<String, HashMap<String, Value>>,
) -> Resource {
    let mut resolved = resource.clone();
    for (key, value) in &resource.attributes {
        resolved
            .attributes
            .insert(key.clone(), resolve_ref_value(value, bindings));
    }
    resolved
}

/// Whether any attribute still holds an unresolved reference
pub fn has_unresolved_refs(resource: &Resource) -> bool {
    fn check(value: &Value) -> bool {
        match value {
            Value::String(s) => parse_ref(s).is_some(),
            Value::List(items) => items.iter().any(check),
            Value::Map(map) => map.values().any(check),
            _ => false,
        }
    }
    resource.attributes.values().any(check)
}
