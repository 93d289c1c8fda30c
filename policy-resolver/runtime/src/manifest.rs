//! Loads a snapshot from Kubernetes manifests on disk.

use crate::{
    core::{Error, GroupKind, ObjRef, GATEWAY_GROUP},
    index::{Diagnostic, Snapshot},
    k8s::{self, crd, gateway, DynamicObject},
};
use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::{collections::BTreeSet, path::Path};

const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";

/// Reads every object from the given files into a snapshot.
///
/// A file that cannot be read or parsed fails the load. An object that cannot be read is left out
/// of the snapshot and reported as a diagnostic of the cycle.
pub fn load(paths: &[impl AsRef<Path>], policy_label_key: &str) -> Result<Snapshot> {
    let mut objects = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed =
            parse(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), objects = parsed.len(), "read manifests");
        objects.extend(parsed);
    }
    Ok(snapshot(objects, policy_label_key))
}

/// Parses a stream of YAML (or JSON) documents. `List` documents are flattened into their items.
pub fn parse(contents: &str) -> Result<Vec<Value>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(contents) {
        match Value::deserialize(document)? {
            Value::Null => {}
            Value::Object(mut obj) if is_list(&obj) => match obj.remove("items") {
                Some(Value::Array(items)) => objects.extend(items),
                None | Some(Value::Null) => {}
                Some(_) => bail!("list items must be a sequence"),
            },
            obj @ Value::Object(_) => objects.push(obj),
            _ => bail!("manifest documents must be mappings"),
        }
    }
    Ok(objects)
}

/// Sorts parsed objects into a snapshot by their `apiVersion` and `kind`.
///
/// Objects of other kinds are policy instances if a CRD labeled with `policy_label_key` defines
/// their kind, and backends if they are Services or some route's backend reference names their
/// kind. Everything else is ignored.
pub fn snapshot(objects: Vec<Value>, policy_label_key: &str) -> Snapshot {
    let mut snapshot = Snapshot::default();
    let mut others = Vec::new();
    for mut obj in objects {
        let Some(kind) = type_of(&obj) else {
            tracing::warn!(
                name = name_of(&obj).unwrap_or_default(),
                "ignoring object without an apiVersion and kind"
            );
            continue;
        };
        fill_reference_names(&kind, &mut obj);

        let id = id_of(&kind, &obj);
        let read = match (kind.group.as_str(), kind.kind.as_str()) {
            (GATEWAY_GROUP, "GatewayClass") => typed(obj).map(|o| snapshot.gateway_classes.push(o)),
            (GATEWAY_GROUP, "Gateway") => typed(obj).map(|o| snapshot.gateways.push(o)),
            (GATEWAY_GROUP, "HTTPRoute") => typed(obj).map(|o| snapshot.http_routes.push(o)),
            ("", "Namespace") => typed(obj).map(|o| snapshot.namespaces.push(o)),
            (APIEXTENSIONS_GROUP, "CustomResourceDefinition") => {
                typed(obj).map(|o| snapshot.crds.push(o))
            }
            _ => typed::<DynamicObject>(obj).map(|o| others.push((kind.clone(), o))),
        };
        if let Err(error) = read {
            tracing::warn!(%id, %error, "ignoring invalid object");
            snapshot.rejected.push(Diagnostic::new(
                id,
                Error::InvalidObject {
                    reason: error.to_string(),
                },
            ));
        }
    }

    let policy_kinds = snapshot
        .crds
        .iter()
        .filter(|def| crd::label(def, policy_label_key).is_some())
        .map(crd::group_kind)
        .collect::<BTreeSet<_>>();
    let backend_kinds = snapshot
        .http_routes
        .iter()
        .flat_map(|route| gateway::backend_refs(&route.spec))
        .map(|backend| {
            GroupKind::new(
                backend.group.unwrap_or_default(),
                backend.kind.unwrap_or_default(),
            )
        })
        .chain(Some(GroupKind::new("", "Service")))
        .collect::<BTreeSet<_>>();
    for (kind, obj) in others {
        if policy_kinds.contains(&kind) {
            snapshot.policies.push(obj);
        } else if backend_kinds.contains(&kind) {
            snapshot.backends.push(obj);
        } else {
            tracing::debug!(%kind, name = ?obj.metadata.name, "ignoring unrelated object");
        }
    }

    snapshot
}

/// Gives every reference that omits its name an empty one, so that only the reference, and not
/// the whole object, is dropped when it is resolved.
fn fill_reference_names(kind: &GroupKind, obj: &mut Value) {
    let Some(spec) = obj.get_mut("spec").and_then(Value::as_object_mut) else {
        return;
    };
    match (kind.group.as_str(), kind.kind.as_str()) {
        (GATEWAY_GROUP, "Gateway") => {
            spec.entry("gatewayClassName").or_insert_with(|| Value::from(""));
        }
        (GATEWAY_GROUP, "HTTPRoute") => {
            items_mut(spec.get_mut("parentRefs")).for_each(fill_name);
            for rule in items_mut(spec.get_mut("rules")) {
                items_mut(rule.get_mut("backendRefs")).for_each(fill_name);
                for filter in items_mut(rule.get_mut("filters")) {
                    if let Some(mirror) = filter
                        .get_mut("requestMirror")
                        .and_then(|mirror| mirror.get_mut("backendRef"))
                    {
                        fill_name(mirror);
                    }
                }
            }
        }
        _ => {}
    }
}

fn items_mut<'v>(value: Option<&'v mut Value>) -> impl Iterator<Item = &'v mut Value> {
    value.and_then(Value::as_array_mut).into_iter().flatten()
}

fn fill_name(reference: &mut Value) {
    if let Some(reference) = reference.as_object_mut() {
        reference.entry("name").or_insert_with(|| Value::from(""));
    }
}

fn is_list(obj: &serde_json::Map<String, Value>) -> bool {
    obj.get("kind").and_then(Value::as_str) == Some("List")
}

fn type_of(obj: &Value) -> Option<GroupKind> {
    let api_version = obj.get("apiVersion")?.as_str()?;
    let kind = obj.get("kind")?.as_str()?;
    if kind.is_empty() {
        return None;
    }
    Some(GroupKind::new(k8s::api_group(api_version), kind))
}

fn id_of(kind: &GroupKind, obj: &Value) -> ObjRef {
    let namespace = obj
        .get("metadata")
        .and_then(|meta| meta.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    ObjRef::new(
        kind.group.clone(),
        kind.kind.clone(),
        namespace,
        name_of(obj).unwrap_or_default(),
    )
}

fn typed<T: DeserializeOwned>(obj: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(obj)
}

fn name_of(obj: &Value) -> Option<&str> {
    obj.get("metadata")?.get("name")?.as_str()
}
