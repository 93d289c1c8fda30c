//! Accessors for objects whose schema is not known at build time: policies and backends.

use crate::{api_group, DynamicObject};
use gateway_policy_resolver_core::{GroupKind, ObjRef, Reference};

pub type Spec = serde_json::Map<String, serde_json::Value>;

/// The object's kind, as declared by its type metadata.
pub fn group_kind(obj: &DynamicObject) -> Option<GroupKind> {
    let types = obj.types.as_ref()?;
    if types.kind.is_empty() {
        return None;
    }
    Some(GroupKind::new(
        api_group(&types.api_version),
        types.kind.clone(),
    ))
}

/// The reference identifying the object itself.
pub fn obj_ref(obj: &DynamicObject) -> Option<ObjRef> {
    let GroupKind { group, kind } = group_kind(obj)?;
    let name = obj.metadata.name.clone()?;
    Some(ObjRef::new(
        group,
        kind,
        obj.metadata.namespace.clone().unwrap_or_default(),
        name,
    ))
}

pub fn spec(obj: &DynamicObject) -> Option<&Spec> {
    obj.data.get("spec")?.as_object()
}

/// The policy's `spec.targetRef`, if it is present and well-formed.
pub fn target_ref(obj: &DynamicObject) -> Option<Reference> {
    let target = spec(obj)?.get("targetRef")?;
    match serde_json::from_value(target.clone()) {
        Ok(reference) => Some(reference),
        Err(error) => {
            tracing::debug!(%error, "invalid targetRef");
            None
        }
    }
}
