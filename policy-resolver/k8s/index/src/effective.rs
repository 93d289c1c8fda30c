//! Computes the policies that are in effect for a resource.
//!
//! Direct policies apply only to the resource they target and are reported as-is. Inherited
//! policies flow down the resource hierarchy: a resource is affected by every inherited policy
//! attached to it or to any of its ancestors, and these are merged from the most distant
//! ancestor to the resource itself.
//!
//! When a resource has several parents, its ancestors are linearized by their longest distance
//! from the resource, farthest first, with ties broken by reference order. So a GatewayClass
//! always precedes the Gateways of that class, whichever route is being resolved.

use crate::{Attachments, Graph};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gateway_policy_resolver_core::{
    merge::merge, Candidate, EffectivePolicies, EffectivePolicy, GroupKind, ObjRef, Overlay,
    PolicyInstance,
};
use std::collections::BTreeMap;

/// Answers policy queries against the results of one discovery cycle.
#[derive(Copy, Clone, Debug)]
pub struct Engine<'a> {
    graph: &'a Graph,
    attachments: &'a Attachments,
    namespace_ancestors: bool,
}

/// The ordered ancestors of a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ancestry {
    /// The resource's ancestors from most distant to closest, followed by the resource itself.
    pub chain: Vec<ObjRef>,

    /// Ancestors at which a walk returned to a resource already on its path.
    pub cycles: Vec<ObjRef>,
}

struct Walk<'g> {
    graph: &'g Graph,
    on_path: HashSet<&'g ObjRef>,
    depths: HashMap<&'g ObjRef, usize>,
    cycles: Vec<ObjRef>,
}

// === impl Engine ===

impl<'a> Engine<'a> {
    pub fn new(graph: &'a Graph, attachments: &'a Attachments, namespace_ancestors: bool) -> Self {
        Self {
            graph,
            attachments,
            namespace_ancestors,
        }
    }

    pub fn ancestry(&self, node: &ObjRef) -> Ancestry {
        self.walk(node, None)
    }

    /// The chain along which inherited policies are merged: the resource's ancestors, most
    /// distant first, ending with the resource itself.
    pub fn ancestors(&self, node: &ObjRef) -> Vec<ObjRef> {
        self.ancestry(node).chain
    }

    /// The direct policies that target exactly this resource.
    pub fn directly_attached(&self, node: &ObjRef) -> Vec<&'a PolicyInstance> {
        self.attachments.direct(node).iter().collect()
    }

    /// Every inherited policy that affects this resource, in the order in which they are merged.
    pub fn inherited(&self, node: &ObjRef) -> Vec<&'a PolicyInstance> {
        self.inherited_along(&self.ancestry(node).chain)
    }

    /// The effective value of every policy kind that affects this resource.
    pub fn effective(&self, node: &ObjRef) -> EffectivePolicies {
        let ancestry = self.ancestry(node);
        self.effective_along(node, &ancestry.chain)
    }

    /// The effective policies for a resource as seen through one of its parents.
    ///
    /// This differs from [`Engine::effective`] only for resources with several parents, such as
    /// a route attached to more than one Gateway. Returns `None` if `parent` is not a parent of
    /// `node`.
    pub fn effective_via(&self, node: &ObjRef, parent: &ObjRef) -> Option<EffectivePolicies> {
        if !self.graph.parents(node).any(|p| p == parent) {
            return None;
        }
        let ancestry = self.walk(node, Some(parent));
        Some(self.effective_along(node, &ancestry.chain))
    }

    fn inherited_along(&self, chain: &[ObjRef]) -> Vec<&'a PolicyInstance> {
        chain
            .iter()
            .flat_map(|id| self.attachments.inherited(id))
            .collect()
    }

    fn effective_along(&self, node: &ObjRef, chain: &[ObjRef]) -> EffectivePolicies {
        let mut effective = EffectivePolicies::new();

        let mut direct = BTreeMap::<&GroupKind, Vec<&PolicyInstance>>::new();
        for instance in self.attachments.direct(node) {
            direct.entry(&instance.kind).or_default().push(instance);
        }
        for (kind, instances) in direct {
            let fields = |instance: &&PolicyInstance| {
                instance.direct_fields().cloned().unwrap_or_default()
            };
            let policy = match instances.as_slice() {
                [instance] => EffectivePolicy::Resolved(fields(instance)),
                candidates => {
                    tracing::debug!(
                        %node,
                        %kind,
                        policies = candidates.len(),
                        "ambiguous direct policies"
                    );
                    EffectivePolicy::Ambiguous(
                        candidates
                            .iter()
                            .map(|instance| Candidate {
                                policy: instance.id.clone(),
                                fields: fields(instance),
                            })
                            .collect(),
                    )
                }
            };
            effective.insert(kind.clone(), policy);
        }

        let mut inherited = BTreeMap::<&GroupKind, Vec<&Overlay>>::new();
        for instance in self.inherited_along(chain) {
            if let Some(overlay) = instance.overlay() {
                inherited.entry(&instance.kind).or_default().push(overlay);
            }
        }
        for (kind, overlays) in inherited {
            effective.insert(kind.clone(), EffectivePolicy::Resolved(merge(overlays)));
        }

        effective
    }

    fn walk(&self, node: &ObjRef, via: Option<&ObjRef>) -> Ancestry {
        let Some(start) = self.graph.node(node) else {
            return Ancestry {
                chain: vec![node.clone()],
                cycles: vec![],
            };
        };

        let mut walk = Walk {
            graph: self.graph,
            on_path: HashSet::new(),
            depths: HashMap::new(),
            cycles: Vec::new(),
        };
        walk.on_path.insert(&start.id);
        for parent in start.parents().filter(|p| via.map_or(true, |via| via == *p)) {
            walk.visit(parent, 1);
        }
        if !walk.cycles.is_empty() {
            tracing::debug!(%node, cycles = ?walk.cycles, "ancestor walk revisited resources");
        }

        let mut ancestors = walk.depths.into_iter().collect::<Vec<_>>();
        ancestors.sort_by(|(a, da), (b, db)| db.cmp(da).then_with(|| a.cmp(b)));
        let mut chain = ancestors
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        chain.push(start.id.clone());

        if self.namespace_ancestors {
            chain = self.with_namespaces(chain);
        }

        Ancestry {
            chain,
            cycles: walk.cycles,
        }
    }

    /// Places each namespaced resource's Namespace immediately before it. A Namespace that
    /// would appear more than once keeps only its last position.
    fn with_namespaces(&self, chain: Vec<ObjRef>) -> Vec<ObjRef> {
        let mut expanded = Vec::with_capacity(chain.len() * 2);
        for id in chain {
            if !id.is_cluster_scoped() {
                let ns = ObjRef::cluster("", "Namespace", id.namespace.clone());
                if self.graph.contains(&ns) {
                    expanded.push(ns);
                }
            }
            expanded.push(id);
        }

        let mut seen = HashSet::new();
        let mut chain = expanded
            .into_iter()
            .rev()
            .filter(|id| seen.insert(id.clone()))
            .collect::<Vec<_>>();
        chain.reverse();
        chain
    }
}

// === impl Walk ===

impl<'g> Walk<'g> {
    /// Records the longest distance from the start to each ancestor.
    fn visit(&mut self, id: &'g ObjRef, depth: usize) {
        if self.on_path.contains(id) {
            if !self.cycles.contains(id) {
                self.cycles.push(id.clone());
            }
            return;
        }
        match self.depths.get(id) {
            Some(&seen) if seen >= depth => return,
            _ => {
                self.depths.insert(id, depth);
            }
        }

        let Some(node) = self.graph.node(id) else {
            return;
        };
        self.on_path.insert(id);
        for parent in node.parents() {
            self.visit(parent, depth + 1);
        }
        self.on_path.remove(id);
    }
}
