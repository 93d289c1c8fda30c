use crate::{effective::Engine, Diagnostic, NodeKind, ResourceNode};
use gateway_policy_resolver_core::{EffectivePolicies, GroupKind, ObjRef, PolicyInstance};
use serde::Serialize;
use std::collections::BTreeMap;

/// The policies that apply to one resource.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePolicies {
    pub resource: ObjRef,
    pub kind: NodeKind,

    /// Set when the resource was referenced but never observed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,

    pub directly_attached: Vec<PolicyRef>,
    pub inherited: Vec<InheritedPolicyRef>,
    pub effective: EffectivePolicies,

    /// For resources with more than one parent, the effective policies seen through each
    /// parent, keyed by the parent's reference.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub effective_by_parent: BTreeMap<String, EffectivePolicies>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRef {
    pub kind: GroupKind,
    pub policy: ObjRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritedPolicyRef {
    pub kind: GroupKind,
    pub policy: ObjRef,

    /// The resource, the queried one or one of its ancestors, that the policy targets.
    pub target: ObjRef,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub resources: Vec<NodePolicies>,
    pub diagnostics: Vec<Diagnostic>,
}

// === impl NodePolicies ===

impl NodePolicies {
    pub fn new(node: &ResourceNode, engine: &Engine<'_>) -> Self {
        let id = &node.id;

        let parents = node.parents().collect::<Vec<_>>();
        let effective_by_parent = if parents.len() > 1 {
            parents
                .into_iter()
                .filter_map(|parent| {
                    let effective = engine.effective_via(id, parent)?;
                    Some((parent.to_string(), effective))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        Self {
            resource: id.clone(),
            kind: node.kind,
            placeholder: node.is_placeholder(),
            directly_attached: engine
                .directly_attached(id)
                .into_iter()
                .map(PolicyRef::from)
                .collect(),
            inherited: engine
                .inherited(id)
                .into_iter()
                .map(InheritedPolicyRef::from)
                .collect(),
            effective: engine.effective(id),
            effective_by_parent,
        }
    }
}

impl From<&PolicyInstance> for PolicyRef {
    fn from(instance: &PolicyInstance) -> Self {
        Self {
            kind: instance.kind.clone(),
            policy: instance.id.clone(),
        }
    }
}

impl From<&PolicyInstance> for InheritedPolicyRef {
    fn from(instance: &PolicyInstance) -> Self {
        Self {
            kind: instance.kind.clone(),
            policy: instance.id.clone(),
            target: instance.target.clone(),
        }
    }
}
