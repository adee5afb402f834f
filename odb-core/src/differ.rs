//! Differ - Compare desired state with current state
//!
//! Compares the desired state declared in configuration with the state
//! read back from the control plane, and decides which lifecycle
//! operation each resource needs.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists but some changes can't be made in place -> delete
    /// and create again
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
        /// The changed attributes that force the replacement
        forced_by: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state, sorted by name
pub fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Turn updates touching an attribute for which `requires_replacement`
/// holds into replacements
pub fn mark_replacements(
    diffs: Vec<Diff>,
    requires_replacement: impl Fn(&ResourceId, &str) -> bool,
) -> Vec<Diff> {
    diffs
        .into_iter()
        .map(|diff| match diff {
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                let forced_by: Vec<String> = changed_attributes
                    .iter()
                    .filter(|attr| requires_replacement(&id, attr))
                    .cloned()
                    .collect();
                if forced_by.is_empty() {
                    Diff::Update {
                        id,
                        from,
                        to,
                        changed_attributes,
                    }
                } else {
                    Diff::Replace {
                        id,
                        from,
                        to,
                        changed_attributes,
                        forced_by,
                    }
                }
            }
            other => other,
        })
        .collect()
}

/// Compute a Diff for every desired resource, in declaration order
pub fn diff_all(desired: &[Resource], current_states: &HashMap<ResourceId, State>) -> Vec<Diff> {
    desired
        .iter()
        .filter(|r| !r.is_data_source())
        .map(|resource| {
            let current = current_states
                .get(&resource.id)
                .cloned()
                .unwrap_or_else(|| State::not_found(resource.id.clone()));
            diff(resource, &current)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("odb.network", "test");
        let current = State::not_found(ResourceId::new("odb.network", "test"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("odb.network", "test")
            .with_attribute("s3_access", Value::String("ENABLED".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("s3_access".to_string(), Value::String("ENABLED".to_string()));
        attrs.insert("status".to_string(), Value::String("AVAILABLE".to_string()));
        let current = State::existing(ResourceId::new("odb.network", "test"), attrs);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("odb.network", "test")
            .with_attribute("zero_etl_access", Value::String("ENABLED".to_string()))
            .with_attribute("s3_access", Value::String("DISABLED".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert(
            "zero_etl_access".to_string(),
            Value::String("DISABLED".to_string()),
        );
        attrs.insert("s3_access".to_string(), Value::String("ENABLED".to_string()));
        let current = State::existing(ResourceId::new("odb.network", "test"), attrs);

        let result = diff(&desired, &current);
        match result {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert_eq!(changed_attributes, vec!["s3_access", "zero_etl_access"]);
            }
            _ => panic!("Expected Update"),
        }
    }

    #[test]
    fn internal_attributes_are_ignored() {
        let desired = Resource::new("odb.network", "test")
            .with_attribute("_depends_on", Value::String("infra".to_string()));
        let current = State::existing(ResourceId::new("odb.network", "test"), HashMap::new());

        assert!(matches!(diff(&desired, &current), Diff::NoChange(_)));
    }

    #[test]
    fn diff_all_skips_data_sources() {
        let resources = vec![
            Resource::new("odb.network", "new"),
            Resource::new("odb.db_server", "lookup").with_read_only(true),
            Resource::new("odb.network", "existing")
                .with_attribute("s3_access", Value::String("ENABLED".to_string())),
        ];

        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("odb.network", "existing"),
            State::existing(ResourceId::new("odb.network", "existing"), HashMap::new()),
        );

        let diffs = diff_all(&resources, &current_states);

        assert_eq!(diffs.len(), 2);
        assert!(matches!(diffs[0], Diff::Create(_)));
        assert!(matches!(diffs[1], Diff::Update { .. }));
    }

    #[test]
    fn updates_of_fixed_attributes_become_replacements() {
        let id = ResourceId::new("odb.cloud_vm_cluster", "cluster");
        let current = State::existing(
            id.clone(),
            HashMap::from([
                ("cpu_core_count".to_string(), Value::Int(16)),
                ("display_name".to_string(), Value::String("old".to_string())),
            ]),
        );
        let resize = Resource::new("odb.cloud_vm_cluster", "cluster")
            .with_attribute("cpu_core_count", Value::Int(32))
            .with_attribute("display_name", Value::String("new".to_string()));
        let rename = Resource::new("odb.cloud_vm_cluster", "cluster")
            .with_attribute("display_name", Value::String("new".to_string()));

        let diffs = mark_replacements(
            vec![diff(&resize, &current), diff(&rename, &current)],
            |_, attr| attr == "cpu_core_count",
        );

        match &diffs[0] {
            Diff::Replace {
                changed_attributes,
                forced_by,
                ..
            } => {
                assert_eq!(changed_attributes, &vec!["cpu_core_count", "display_name"]);
                assert_eq!(forced_by, &vec!["cpu_core_count"]);
            }
            other => panic!("Expected Replace, got {:?}", other),
        }
        assert!(diffs[0].is_change());
        assert!(matches!(diffs[1], Diff::Update { .. }));
    }
}
