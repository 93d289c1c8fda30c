//! Binding of policy instances to the resources they target.

use crate::{Descriptors, Diagnostic, Graph};
use ahash::AHashMap as HashMap;
use gateway_policy_resolver_core::{
    Classification, Error, GroupKind, ObjRef, PolicyBody, PolicyInstance, Resolver,
};
use gateway_policy_resolver_k8s_api::{dynamic, DynamicObject};

/// Policy instances indexed by the resource they target, partitioned by classification.
///
/// Each list is ordered by policy reference.
#[derive(Clone, Debug, Default)]
pub struct Attachments {
    direct: HashMap<ObjRef, Vec<PolicyInstance>>,
    inherited: HashMap<ObjRef, Vec<PolicyInstance>>,
}

// === impl Attachments ===

impl Attachments {
    pub fn index(
        policies: &[DynamicObject],
        graph: &Graph,
        descriptors: &Descriptors,
        resolver: &Resolver,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut index = Self::default();
        for obj in policies {
            let Some(instance) = bind(obj, graph, descriptors, resolver, diagnostics) else {
                continue;
            };
            tracing::debug!(policy = %instance.id, target = %instance.target, "attached policy");
            let by_target = match instance.classification() {
                Classification::Direct => &mut index.direct,
                Classification::Inherited => &mut index.inherited,
                Classification::Unknown => continue,
            };
            by_target
                .entry(instance.target.clone())
                .or_default()
                .push(instance);
        }

        for instances in index.direct.values_mut().chain(index.inherited.values_mut()) {
            instances.sort_by(|a, b| a.id.cmp(&b.id));
        }
        index
    }

    /// Direct policies whose target is exactly `target`.
    pub fn direct(&self, target: &ObjRef) -> &[PolicyInstance] {
        self.direct
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Inherited policies whose target is exactly `target`.
    pub fn inherited(&self, target: &ObjRef) -> &[PolicyInstance] {
        self.inherited
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All policies whose target is exactly `target`, direct before inherited.
    pub fn attached(&self, target: &ObjRef) -> impl Iterator<Item = &PolicyInstance> {
        self.direct(target).iter().chain(self.inherited(target))
    }

    pub fn len(&self) -> usize {
        self.direct
            .values()
            .chain(self.inherited.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binds a single policy object to its target, or explains why it cannot be.
fn bind(
    obj: &DynamicObject,
    graph: &Graph,
    descriptors: &Descriptors,
    resolver: &Resolver,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<PolicyInstance> {
    let Some(mut id) = dynamic::obj_ref(obj) else {
        tracing::warn!(name = ?obj.metadata.name, "ignoring policy without a kind or name");
        return None;
    };
    let kind = GroupKind::new(id.group.clone(), id.kind.clone());

    let classification = match descriptors.classification(&kind) {
        Some(classification @ (Classification::Direct | Classification::Inherited)) => {
            classification
        }
        Some(Classification::Unknown) => {
            tracing::debug!(policy = %id, "skipping policy of unclassified kind");
            return None;
        }
        None => {
            tracing::debug!(object = %id, "skipping object that is not a known policy kind");
            return None;
        }
    };

    if id.namespace.is_empty() && !resolver.is_cluster_scoped(&kind) {
        id.namespace = resolver.default_namespace().to_string();
    }

    let Some(reference) = dynamic::target_ref(obj) else {
        tracing::warn!(policy = %id, "ignoring policy without a targetRef");
        diagnostics.push(Diagnostic::new(id, Error::missing_reference("targetRef")));
        return None;
    };
    let target = match resolver.resolve(&reference, &id.namespace) {
        Ok(target) => target,
        Err(error) => {
            tracing::warn!(policy = %id, %error, "ignoring policy with a malformed targetRef");
            diagnostics.push(Diagnostic::new(id, error));
            return None;
        }
    };

    if !graph.contains(&target) {
        tracing::warn!(policy = %id, %target, "policy target does not exist");
        diagnostics.push(Diagnostic::new(
            id.clone(),
            Error::OrphanedPolicy {
                policy: id,
                target,
            },
        ));
        return None;
    }

    let spec = dynamic::spec(obj).cloned().unwrap_or_default();
    let body = PolicyBody::from_spec(classification, &spec)?;
    Some(PolicyInstance {
        id,
        kind,
        target,
        body,
    })
}
